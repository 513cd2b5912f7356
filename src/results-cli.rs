//! A simple CLI tool for checking and exporting election results.
//! This uses the server's own results types, and is by definition compatible
//! with the output of `GET /results/<election_id>`.

use std::fs::File;
use std::io::BufReader;

use clap::{builder::PossibleValuesParser, Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use evote_backend::voting::{write_csv, ElectionResults};

const PROGRAM_NAME: &str = "results-cli";

const ABOUT_TEXT: &str = "Check the consistency of election results and print them.

EXIT CODES:
     0: Results are consistent.
   255: Ran successfully, but the results are inconsistent.
 Other: Error.";

const RESULTS_PATH: &str = "RESULTS_PATH";

const RESULTS_PATH_HELP: &str = "The path to a JSON results document,\n\
as returned by `GET /results/<election_id>`";

const FORMAT: &str = "format";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(RESULTS_PATH)
                .help(RESULTS_PATH_HELP)
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(FORMAT)
                .long(FORMAT)
                .short('f')
                .help("How to print the results")
                .action(ArgAction::Set)
                .value_parser(PossibleValuesParser::new(["csv", "table"]))
                .default_value("csv"),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON document.
    Format(String),
    /// The document disagrees with itself, for the contained reason.
    Inconsistent(String),
}

/// Load the results and check them.
fn load(path: &str) -> Result<ElectionResults, Error> {
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let results: ElectionResults =
        serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;

    match results.inconsistency() {
        Some(reason) => Err(Error::Inconsistent(reason)),
        None => Ok(results),
    }
}

/// Render results as an aligned plain-text table.
fn table(results: &ElectionResults) -> String {
    let width = results
        .candidates
        .iter()
        .map(|c| c.name.chars().count())
        .chain(["Candidate".len()])
        .max()
        .unwrap_or_default();

    let mut out = format!(
        "{} ({} vote{})\n{:<width$}  {:>7}  {:>8}\n",
        results.title,
        results.total_votes,
        if results.total_votes != 1 { "s" } else { "" },
        "Candidate",
        "Votes",
        "Share",
    );
    for candidate in &results.candidates {
        out.push_str(&format!(
            "{:<width$}  {:>7}  {:>7.2}%\n",
            candidate.name, candidate.votes, candidate.percentage
        ));
    }
    out
}

/// Check the results, print them, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(RESULTS_PATH).unwrap(); // Required argument is guaranteed to be present.
    let format: &String = args.get_one(FORMAT).unwrap(); // Has a default value.

    let results = match load(path) {
        Ok(results) => results,
        Err(Error::IO(msg)) => {
            eprintln!("Could not read {path}: {msg}");
            return 1;
        }
        Err(Error::Format(msg)) => {
            eprintln!("Could not parse {path}: {msg}");
            return 1;
        }
        Err(Error::Inconsistent(reason)) => {
            println!("Results are inconsistent: {reason}");
            return 255;
        }
    };

    if format == "table" {
        print!("{}", table(&results));
        return 0;
    }
    match write_csv(&results) {
        Ok(csv) => {
            print!("{csv}");
            0
        }
        Err(e) => {
            eprintln!("Could not write CSV: {e}");
            1
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading() {
        // This test actually enters backend code, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(["evote_backend"], None, None);

        let results = load("example_dumps/results.json").unwrap();
        assert_eq!(results.total_votes, 4);
        assert_eq!(results.candidates[0].name, "Grace Hopper");

        let results = load("example_dumps/results_empty.json").unwrap();
        assert_eq!(results.candidates[0].percentage, 0.0);

        assert!(matches!(
            load("example_dumps/results_invalid_totals.json"),
            Err(Error::Inconsistent(reason)) if reason.contains("sum to 4")
        ));
        assert!(matches!(
            load("example_dumps/results_invalid_order.json"),
            Err(Error::Inconsistent(reason)) if reason.contains("ranked above")
        ));
        assert!(matches!(
            load("example_dumps/results_malformed.json"),
            Err(Error::Format(_))
        ));
        assert!(matches!(load("not a real file"), Err(Error::IO(_))));
    }

    #[test]
    fn table_is_aligned() {
        let results = load("example_dumps/results.json").unwrap();
        let table = table(&results);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines[0], "Student Council (4 votes)");
        assert_eq!(lines[1], "Candidate       Votes     Share");
        assert_eq!(lines[2], "Grace Hopper        3    75.00%");
        assert_eq!(lines[3], "Alan Turing         1    25.00%");
    }

    #[test]
    fn correct_cli_usage() {
        let command_line = [PROGRAM_NAME, "example_dumps/results.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let command_line = [PROGRAM_NAME, "example_dumps/results.json", "--format", "table"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let command_line = [PROGRAM_NAME, "example_dumps/results_invalid_totals.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 255);

        let command_line = [PROGRAM_NAME, "example_dumps/results_malformed.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);

        let command_line = [PROGRAM_NAME, "not a real file"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);
    }

    #[test]
    fn bad_cli_usage() {
        // Something very wrong.
        let command_line = [PROGRAM_NAME, "this", "invocation", "is", "incorrect"];
        cli().try_get_matches_from(command_line).unwrap_err();

        // Unknown format.
        let command_line = [PROGRAM_NAME, "example_dumps/results.json", "-f", "xml"];
        cli().try_get_matches_from(command_line).unwrap_err();

        // No options at all.
        let command_line = [PROGRAM_NAME];
        cli().try_get_matches_from(command_line).unwrap_err();
    }
}
