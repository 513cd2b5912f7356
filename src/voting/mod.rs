//! Vote admission, the results projection, and CSV reports built on it.

mod admission;
mod report;
mod results;

pub use admission::{cast_vote, AdmissionPolicy, Caller};
pub use report::{report_filename, write_csv};
pub use results::{get_results, percentage, project, CandidateResult, ElectionResults};

use crate::model::mongodb::Id;

/// A single voter's choice in a single election: the unit of work of vote admission.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Vote {
    pub voter_id: Id,
    pub election_id: Id,
    pub candidate_id: Id,
}
