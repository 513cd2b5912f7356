use csv::WriterBuilder;

use crate::error::{Error, Result};

use super::results::ElectionResults;

const HEADER: [&str; 4] = ["Candidate Name", "Bio", "Votes", "Percentage"];

/// Render results as a CSV report: a header, a summary row naming the
/// election and its total, then one row per candidate in ranking order.
pub fn write_csv(results: &ElectionResults) -> Result<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(HEADER)?;
    writer.write_record([
        format!("Election: {}", results.title),
        format!("Total Votes: {}", results.total_votes),
        String::new(),
        String::new(),
    ])?;
    for candidate in &results.candidates {
        writer.write_record([
            candidate.name.clone(),
            candidate.bio.clone(),
            candidate.votes.to_string(),
            format!("{:.2}%", candidate.percentage),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("Failed to flush CSV report: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::Internal(format!("CSV report is not UTF-8: {e}")))
}

/// The attachment filename for an election's report. Characters that would
/// break the `Content-Disposition` header or escape a directory are dropped.
pub fn report_filename(title: &str) -> String {
    let title: String = title
        .chars()
        .filter(|c| !matches!(c, '"' | '/' | '\\') && !c.is_control())
        .collect();
    let title = title.trim();
    if title.is_empty() {
        "election-results.csv".to_string()
    } else {
        format!("{title}-results.csv")
    }
}
