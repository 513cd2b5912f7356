use std::collections::{BTreeMap, HashSet};

use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{
    db::{
        candidate::{Candidate, CandidateEdit, NewCandidate},
        election::{Election, ElectionEdit, NewElection},
        user::{NewUser, User},
    },
    mongodb::Id,
};
use crate::voting::Vote;

use super::{in_election_order, CandidateRemoval, Commit, Store};

/// Everything the in-memory backend knows. `BTreeMap`s keep listings in
/// creation order, since fresh IDs sort that way.
#[derive(Default)]
struct State {
    users: BTreeMap<Id, User>,
    elections: BTreeMap<Id, Election>,
    candidates: BTreeMap<Id, Candidate>,
    /// `(voter_id, election_id)` pairs with an admitted vote.
    participations: HashSet<(Id, Id)>,
}

impl State {
    fn candidates_of(&self, election: &Election) -> Vec<Candidate> {
        let candidates = self
            .candidates
            .values()
            .filter(|candidate| candidate.election_id == election.id)
            .cloned()
            .collect();
        in_election_order(&election.candidates, candidates)
    }
}

/// A storage backend that keeps all state in process memory behind a single
/// lock. Used by the test suite and for local development; nothing survives a
/// restart.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|existing| existing.email == user.email) {
            return Err(Error::BadRequest(format!(
                "Email address already in use: {}",
                user.email
            )));
        }
        let user = User {
            id: Id::new(),
            user,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn list_elections(&self) -> Result<Vec<Election>> {
        Ok(self.state.lock().await.elections.values().cloned().collect())
    }

    async fn get_election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.state.lock().await.elections.get(&id).cloned())
    }

    async fn insert_election(&self, election: NewElection) -> Result<Election> {
        let election = Election {
            id: Id::new(),
            election,
        };
        self.state
            .lock()
            .await
            .elections
            .insert(election.id, election.clone());
        Ok(election)
    }

    async fn update_election(&self, id: Id, edit: ElectionEdit) -> Result<Option<Election>> {
        let mut state = self.state.lock().await;
        Ok(state.elections.get_mut(&id).map(|election| {
            election.title = edit.title;
            election.description = edit.description;
            election.start_time = edit.start_time;
            election.end_time = edit.end_time;
            election.clone()
        }))
    }

    async fn delete_election(&self, id: Id) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.elections.remove(&id).is_none() {
            return Ok(false);
        }
        state
            .candidates
            .retain(|_, candidate| candidate.election_id != id);
        state
            .participations
            .retain(|(_, election_id)| *election_id != id);
        for user in state.users.values_mut() {
            user.voted_elections.remove(&id);
        }
        Ok(true)
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>> {
        Ok(self.state.lock().await.candidates.values().cloned().collect())
    }

    async fn election_candidates(&self, election_id: Id) -> Result<Option<Vec<Candidate>>> {
        let state = self.state.lock().await;
        Ok(state
            .elections
            .get(&election_id)
            .map(|election| state.candidates_of(election)))
    }

    async fn get_candidate(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.state.lock().await.candidates.get(&id).cloned())
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Option<Candidate>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let election = match state.elections.get_mut(&candidate.election_id) {
            Some(election) => election,
            None => return Ok(None),
        };
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        election.candidates.push(candidate.id);
        state.candidates.insert(candidate.id, candidate.clone());
        Ok(Some(candidate))
    }

    async fn update_candidate(&self, id: Id, edit: CandidateEdit) -> Result<Option<Candidate>> {
        let mut state = self.state.lock().await;
        Ok(state.candidates.get_mut(&id).map(|candidate| {
            candidate.name = edit.name;
            candidate.bio = edit.bio;
            candidate.clone()
        }))
    }

    async fn delete_candidate(&self, id: Id) -> Result<CandidateRemoval> {
        let mut state = self.state.lock().await;
        let (votes, election_id) = match state.candidates.get(&id) {
            Some(candidate) => (candidate.votes, candidate.election_id),
            None => return Ok(CandidateRemoval::NotFound),
        };
        if votes > 0 {
            return Ok(CandidateRemoval::HasVotes(votes));
        }
        state.candidates.remove(&id);
        if let Some(election) = state.elections.get_mut(&election_id) {
            election.candidates.retain(|candidate_id| *candidate_id != id);
        }
        Ok(CandidateRemoval::Removed)
    }

    async fn commit_vote(&self, vote: &Vote) -> Result<Commit> {
        // Every guard is re-checked under the lock, so a check made earlier
        // by the caller can't go stale before the writes land.
        let mut state = self.state.lock().await;
        let key = (vote.voter_id, vote.election_id);

        let voter = match state.users.get(&vote.voter_id) {
            Some(voter) => voter,
            None => return Ok(Commit::VoterMissing),
        };
        if state.participations.contains(&key) || voter.has_voted_in(vote.election_id) {
            return Ok(Commit::AlreadyVoted);
        }
        match state.candidates.get(&vote.candidate_id) {
            Some(candidate) if candidate.election_id == vote.election_id => {}
            _ => return Ok(Commit::CandidateMismatch),
        }

        // All guards passed; nothing below can fail.
        state.participations.insert(key);
        if let Some(voter) = state.users.get_mut(&vote.voter_id) {
            voter.voted_elections.insert(vote.election_id);
        }
        if let Some(candidate) = state.candidates.get_mut(&vote.candidate_id) {
            candidate.votes += 1;
        }
        Ok(Commit::Committed)
    }

    async fn results_snapshot(
        &self,
        election_id: Id,
    ) -> Result<Option<(Election, Vec<Candidate>)>> {
        let state = self.state.lock().await;
        Ok(state.elections.get(&election_id).map(|election| {
            let candidates = state.candidates_of(election);
            (election.clone(), candidates)
        }))
    }
}
