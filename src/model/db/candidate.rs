use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    #[serde(default)]
    pub bio: String,
    /// The owning election. Never changes after creation.
    pub election_id: Id,
    /// Tally of admitted votes. Only ever incremented by vote admission.
    pub votes: u64,
}

impl CandidateCore {
    /// Create a candidate with an empty tally.
    pub fn new(name: String, bio: String, election_id: Id) -> Self {
        Self {
            name,
            bio,
            election_id,
            votes: 0,
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// The editable fields of a candidate. The owning election and the tally
/// cannot be changed once the candidate exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEdit {
    pub name: String,
    pub bio: String,
}

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}
