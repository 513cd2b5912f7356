use serde::{Deserialize, Serialize};

use crate::error::{Entity, Error, Result};
use crate::model::{
    db::{candidate::Candidate, election::Election},
    mongodb::{serde_hex, Id},
};
use crate::store::Store;

/// One candidate's line in the results of an election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub name: String,
    pub bio: String,
    pub votes: u64,
    /// Share of the total, in percent, rounded to two decimal places.
    pub percentage: f64,
}

/// The current standings of an election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    #[serde(with = "serde_hex")]
    pub election_id: Id,
    pub title: String,
    pub total_votes: u64,
    /// Highest tally first.
    pub candidates: Vec<CandidateResult>,
}

impl ElectionResults {
    /// Check that the totals and percentages agree with the per-candidate
    /// tallies, returning a description of the first disagreement.
    pub fn inconsistency(&self) -> Option<String> {
        let sum: u64 = self.candidates.iter().map(|c| c.votes).sum();
        if sum != self.total_votes {
            return Some(format!(
                "total votes is {} but candidate tallies sum to {sum}",
                self.total_votes
            ));
        }
        if let Some(pair) = self
            .candidates
            .windows(2)
            .find(|pair| pair[0].votes < pair[1].votes)
        {
            return Some(format!(
                "{} ({} votes) is ranked above {} ({} votes)",
                pair[0].name, pair[0].votes, pair[1].name, pair[1].votes
            ));
        }
        self.candidates.iter().find_map(|candidate| {
            let expected = percentage(candidate.votes, self.total_votes);
            ((candidate.percentage - expected).abs() > 0.005).then(|| {
                format!(
                    "{} has {}% but {} of {} votes is {expected}%",
                    candidate.name, candidate.percentage, candidate.votes, self.total_votes
                )
            })
        })
    }
}

/// `votes` as a percentage of `total`, rounded to two decimal places.
/// Zero when nobody has voted yet.
pub fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = votes as f64 * 100.0 / total as f64;
    (raw * 100.0).round() / 100.0
}

/// Project an election and its candidates (in the election's candidate
/// order) into results. Ties keep that order.
pub fn project(election: &Election, candidates: Vec<Candidate>) -> ElectionResults {
    let total_votes: u64 = candidates.iter().map(|c| c.votes).sum();
    let mut candidates: Vec<_> = candidates
        .into_iter()
        .map(|c| CandidateResult {
            id: c.id,
            percentage: percentage(c.votes, total_votes),
            votes: c.votes,
            name: c.candidate.name,
            bio: c.candidate.bio,
        })
        .collect();
    // `sort_by` is stable.
    candidates.sort_by(|a, b| b.votes.cmp(&a.votes));

    ElectionResults {
        election_id: election.id,
        title: election.title.clone(),
        total_votes,
        candidates,
    }
}

/// Read a consistent snapshot of an election's results.
pub async fn get_results(store: &dyn Store, election_id: Id) -> Result<ElectionResults> {
    let (election, candidates) = store
        .results_snapshot(election_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Election, election_id))?;
    Ok(project(&election, candidates))
}
