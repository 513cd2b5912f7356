use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Proof that a voter has voted in an election.
///
/// The choice itself is not recorded here; it only exists as the increment on
/// the candidate's tally. A unique index over `(voter_id, election_id)` makes
/// a second participation for the same pair impossible to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub voter_id: Id,
    pub election_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl Participation {
    pub fn new(voter_id: Id, election_id: Id) -> Self {
        Self {
            voter_id,
            election_id,
            cast_at: Utc::now(),
        }
    }
}
