use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an election sits relative to its voting window.
/// Always derived from the start and end times, never stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionPhase {
    /// `now < start_time`.
    Upcoming,
    /// `start_time <= now <= end_time`. Both bounds are inclusive.
    Active,
    /// `now > end_time`.
    Ended,
}

impl ElectionPhase {
    /// Work out the phase of an election spanning `start..=end` at time `now`.
    pub fn at(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < start {
            Self::Upcoming
        } else if now <= end {
            Self::Active
        } else {
            Self::Ended
        }
    }
}

impl Display for ElectionPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Ended => "ended",
        })
    }
}
