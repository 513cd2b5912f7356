//! Storage backends for the identity store and the election/candidate registry.
//!
//! [`Store`] is the single seam between request handling and persistence. The
//! vote admission commit and the results snapshot are part of the trait, since
//! only the backend can make them atomic.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::error::Result;
use crate::model::{
    common::rights::Rights,
    db::{
        candidate::{Candidate, CandidateEdit, NewCandidate},
        election::{Election, ElectionEdit, NewElection},
        user::{NewUser, User},
    },
    mongodb::Id,
};
use crate::voting::Vote;

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// How an attempted vote commit resolved.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Commit {
    /// Tally incremented and participation recorded.
    Committed,
    /// The voter already has a vote recorded for this election.
    AlreadyVoted,
    /// The voter record disappeared before the commit.
    VoterMissing,
    /// No candidate with this ID belongs to this election (any more).
    CandidateMismatch,
}

/// How an attempted candidate deletion resolved.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CandidateRemoval {
    Removed,
    NotFound,
    /// Deleting would discard this many admitted votes.
    HasVotes(u64),
}

/// Persistence operations needed by the server.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    /// Insert a new user account.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    async fn get_user(&self, id: Id) -> Result<Option<User>>;

    /// Get a user, but only if they hold voter rights.
    async fn get_voter(&self, id: Id) -> Result<Option<User>> {
        Ok(self
            .get_user(id)
            .await?
            .filter(|user| user.role == Rights::Voter))
    }

    /// Has this voter had a vote admitted in this election?
    async fn has_voted(&self, voter_id: Id, election_id: Id) -> Result<bool> {
        Ok(self
            .get_user(voter_id)
            .await?
            .map_or(false, |user| user.has_voted_in(election_id)))
    }

    async fn list_elections(&self) -> Result<Vec<Election>>;

    async fn get_election(&self, id: Id) -> Result<Option<Election>>;

    async fn insert_election(&self, election: NewElection) -> Result<Election>;

    async fn update_election(&self, id: Id, edit: ElectionEdit) -> Result<Option<Election>>;

    /// Delete an election together with its candidates and participations,
    /// and remove it from every voter's voted set. Returns false if there was
    /// no such election.
    async fn delete_election(&self, id: Id) -> Result<bool>;

    async fn list_candidates(&self) -> Result<Vec<Candidate>>;

    /// All candidates of an election in the election's own order, or `None`
    /// if the election does not exist.
    async fn election_candidates(&self, election_id: Id) -> Result<Option<Vec<Candidate>>>;

    async fn get_candidate(&self, id: Id) -> Result<Option<Candidate>>;

    /// Insert a candidate and append it to its election's candidate list.
    /// Returns `None` if the election does not exist.
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Option<Candidate>>;

    async fn update_candidate(&self, id: Id, edit: CandidateEdit) -> Result<Option<Candidate>>;

    /// Delete a candidate without votes and pull it from its election's list.
    async fn delete_candidate(&self, id: Id) -> Result<CandidateRemoval>;

    /// Atomically record the voter's participation and increment the
    /// candidate's tally, or change nothing at all.
    async fn commit_vote(&self, vote: &Vote) -> Result<Commit>;

    /// Read an election and its candidates (in election order) from one
    /// consistent state.
    async fn results_snapshot(&self, election_id: Id)
        -> Result<Option<(Election, Vec<Candidate>)>>;
}

/// Shared handle on the configured storage backend, placed in managed state.
#[derive(Clone)]
pub struct Storage(Arc<dyn Store>);

impl Storage {
    pub fn new(store: impl Store + 'static) -> Self {
        Self(Arc::new(store))
    }

    /// A fresh, empty in-memory backend.
    pub fn memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl Deref for Storage {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Storage {
    type Error = ();

    /// Get the storage handle from the managed state.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        req.guard::<&State<Storage>>()
            .await
            .map(|storage| storage.inner().clone())
    }
}

/// Sort candidates into the order given by an election's candidate list.
/// Candidates missing from the list go last, oldest first.
pub(crate) fn in_election_order(order: &[Id], mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    let positions: HashMap<Id, usize> = order
        .iter()
        .enumerate()
        .map(|(position, id)| (*id, position))
        .collect();
    candidates.sort_by_key(|candidate| {
        (
            positions.get(&candidate.id).copied().unwrap_or(usize::MAX),
            candidate.id,
        )
    });
    candidates
}
