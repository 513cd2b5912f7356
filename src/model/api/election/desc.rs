use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::ElectionPhase,
    db::election::Election,
    mongodb::{serde_hex, serde_hex_seq, Id},
};

/// An API-friendly election description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    /// Election unique ID.
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub title: String,
    pub description: String,
    /// Election phase at the time of the request.
    pub phase: ElectionPhase,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Candidate IDs in creation order.
    #[serde(with = "serde_hex_seq")]
    pub candidates: Vec<Id>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            phase: election.phase(),
            title: election.election.title,
            description: election.election.description,
            start_time: election.election.start_time,
            end_time: election.election.end_time,
            candidates: election.election.candidates,
        }
    }
}

/// A summary of an election, shorter than the full `ElectionDescription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    /// Election unique ID.
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub title: String,
    pub phase: ElectionPhase,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            phase: election.phase(),
            title: election.election.title,
            start_time: election.election.start_time,
            end_time: election.election.end_time,
        }
    }
}
