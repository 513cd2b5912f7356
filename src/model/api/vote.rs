use serde::{Deserialize, Serialize};

use crate::model::mongodb::{serde_hex, Id};

/// A voter's choice of candidate in one election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    #[serde(with = "serde_hex")]
    pub election_id: Id,
    #[serde(with = "serde_hex")]
    pub candidate_id: Id,
}

/// A plain acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
