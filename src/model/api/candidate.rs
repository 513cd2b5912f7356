use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::candidate::{Candidate, CandidateEdit, NewCandidate},
    mongodb::{serde_hex, Id},
};

/// A request to add a candidate to an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub bio: String,
    /// The election this candidate stands in.
    #[serde(with = "serde_hex")]
    pub election_id: Id,
}

impl CandidateSpec {
    /// Convert this spec into a new candidate with no votes.
    pub fn into_candidate(self) -> Result<NewCandidate> {
        let name = validated_name(&self.name)?;
        Ok(NewCandidate::new(name, self.bio, self.election_id))
    }
}

/// A request to change a candidate's name or bio. The owning election and
/// tally are not editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEditSpec {
    pub name: String,
    #[serde(default)]
    pub bio: String,
}

impl CandidateEditSpec {
    pub fn into_edit(self) -> Result<CandidateEdit> {
        Ok(CandidateEdit {
            name: validated_name(&self.name)?,
            bio: self.bio,
        })
    }
}

fn validated_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest("Candidate name is required".to_string()));
    }
    Ok(name.to_string())
}

/// An API-friendly candidate description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    #[serde(with = "serde_hex")]
    pub id: Id,
    pub name: String,
    pub bio: String,
    #[serde(with = "serde_hex")]
    pub election_id: Id,
    pub votes: u64,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.candidate.name,
            bio: candidate.candidate.bio,
            election_id: candidate.candidate.election_id,
            votes: candidate.candidate.votes,
        }
    }
}
