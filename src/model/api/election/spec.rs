use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::db::election::{ElectionEdit, NewElection};

/// An election specification, as submitted to create or edit an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    /// Election title.
    pub title: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Voting opens at this instant.
    pub start_time: DateTime<Utc>,
    /// Voting closes at this instant.
    pub end_time: DateTime<Utc>,
}

impl ElectionSpec {
    /// Reject blank titles and empty or inverted voting windows.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::BadRequest("Election title is required".to_string()));
        }
        if self.end_time <= self.start_time {
            return Err(Error::BadRequest(format!(
                "Election must end after it starts ({} is not after {})",
                self.end_time, self.start_time
            )));
        }
        Ok(())
    }

    /// Convert this spec into a new election with no candidates.
    pub fn into_election(self) -> Result<NewElection> {
        self.validate()?;
        Ok(NewElection {
            title: self.title.trim().to_string(),
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            candidates: Vec::new(),
        })
    }

    /// Convert this spec into an edit of an existing election.
    pub fn into_edit(self) -> Result<ElectionEdit> {
        self.validate()?;
        Ok(ElectionEdit {
            title: self.title.trim().to_string(),
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
        })
    }
}
