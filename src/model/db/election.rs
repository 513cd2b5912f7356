use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::election::ElectionPhase, mongodb::Id};

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Candidate IDs, in the order the candidates were created.
    #[serde(default)]
    pub candidates: Vec<Id>,
}

impl ElectionCore {
    /// The phase of this election at time `now`.
    pub fn phase_at(&self, now: DateTime<Utc>) -> ElectionPhase {
        ElectionPhase::at(self.start_time, self.end_time, now)
    }

    /// The phase of this election right now.
    pub fn phase(&self) -> ElectionPhase {
        self.phase_at(Utc::now())
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// The editable fields of an election. The candidate list is managed
/// through candidate creation and deletion only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionEdit {
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
