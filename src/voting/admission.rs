use crate::config::Config;
use crate::error::{Entity, Error, Result};
use crate::model::{
    common::{election::ElectionPhase, rights::Rights},
    mongodb::Id,
};
use crate::store::{Commit, Store};

use super::Vote;

/// Settings that change which votes are admitted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Reject votes for elections outside their start..=end window.
    pub enforce_voting_window: bool,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            enforce_voting_window: true,
        }
    }
}

impl From<&Config> for AdmissionPolicy {
    fn from(config: &Config) -> Self {
        Self {
            enforce_voting_window: config.enforce_voting_window(),
        }
    }
}

/// Whoever presented a valid auth token, whatever their rights.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Id,
    pub rights: Rights,
}

/// Admit one vote from `caller` for `candidate_id` in `election_id`.
///
/// Checks run in a fixed order and the first failure is returned:
/// caller rights, voter existence, prior vote, election existence, candidate
/// existence, candidate ownership, then (if the policy says so) the voting
/// window. Only then is the vote committed, and the commit re-checks the
/// guards that concurrent requests could have invalidated in the meantime.
///
/// Not idempotent: repeating an admitted vote fails with [`Error::AlreadyVoted`].
pub async fn cast_vote(
    store: &dyn Store,
    policy: AdmissionPolicy,
    caller: Caller,
    election_id: Id,
    candidate_id: Id,
) -> Result<()> {
    let result = admit(store, policy, caller, election_id, candidate_id).await;
    match &result {
        Ok(()) => info!(
            "Admitted vote from voter {} in election {election_id}",
            caller.id
        ),
        Err(e) => debug!(
            "Rejected vote from {} {} in election {election_id}: {e}",
            caller.rights, caller.id
        ),
    }
    result
}

async fn admit(
    store: &dyn Store,
    policy: AdmissionPolicy,
    caller: Caller,
    election_id: Id,
    candidate_id: Id,
) -> Result<()> {
    if caller.rights != Rights::Voter {
        return Err(Error::Forbidden("Only voters can vote".to_string()));
    }

    let voter = store
        .get_voter(caller.id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Voter, caller.id))?;

    if store.has_voted(voter.id, election_id).await? {
        return Err(Error::AlreadyVoted);
    }

    let election = store
        .get_election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Election, election_id))?;

    let candidate = store
        .get_candidate(candidate_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Candidate, candidate_id))?;

    if candidate.election_id != election.id {
        return Err(Error::InvalidCandidate);
    }

    if policy.enforce_voting_window {
        let phase = election.phase();
        if phase != ElectionPhase::Active {
            return Err(Error::ElectionNotActive(phase));
        }
    }

    let vote = Vote {
        voter_id: voter.id,
        election_id,
        candidate_id,
    };
    match store.commit_vote(&vote).await? {
        Commit::Committed => Ok(()),
        Commit::AlreadyVoted => Err(Error::AlreadyVoted),
        Commit::VoterMissing => Err(Error::not_found(Entity::Voter, voter.id)),
        // Ownership never changes, so the candidate must have been deleted.
        Commit::CandidateMismatch => Err(Error::not_found(Entity::Candidate, candidate_id)),
    }
}

#[cfg(test)]
mod tests {
    use rocket::{futures::future::join_all, tokio};

    use super::*;

    use crate::model::db::{
        candidate::{Candidate, CandidateCore},
        election::{Election, ElectionCore},
        user::{User, UserCore},
    };
    use crate::store::Storage;

    fn init_logging() {
        log4rs_test_utils::test_logging::init_logging_once_for(["evote_backend"], None, None);
    }

    async fn add_election(storage: &Storage, election: ElectionCore) -> Election {
        storage.insert_election(election).await.unwrap()
    }

    async fn add_candidate(storage: &Storage, election: &Election, name: &str) -> Candidate {
        let candidate = CandidateCore::new(name.to_string(), format!("{name}'s bio"), election.id);
        storage.insert_candidate(candidate).await.unwrap().unwrap()
    }

    async fn add_voter(storage: &Storage, voter: UserCore) -> Caller {
        let voter: User = storage.insert_user(voter).await.unwrap();
        Caller {
            id: voter.id,
            rights: voter.role,
        }
    }

    async fn votes_for(storage: &Storage, candidate: &Candidate) -> u64 {
        storage
            .get_candidate(candidate.id)
            .await
            .unwrap()
            .unwrap()
            .votes
    }

    async fn vote(storage: &Storage, caller: Caller, election: Id, candidate: Id) -> Result<()> {
        cast_vote(
            &**storage,
            AdmissionPolicy::default(),
            caller,
            election,
            candidate,
        )
        .await
    }

    #[rocket::async_test]
    async fn second_vote_is_rejected() {
        init_logging();
        let storage = Storage::memory();
        let election = add_election(&storage, ElectionCore::active_example()).await;
        let a = add_candidate(&storage, &election, "A").await;
        let b = add_candidate(&storage, &election, "B").await;
        let voter = add_voter(&storage, UserCore::voter_example()).await;

        vote(&storage, voter, election.id, a.id).await.unwrap();
        assert_eq!(votes_for(&storage, &a).await, 1);

        let second = vote(&storage, voter, election.id, b.id).await;
        assert!(matches!(second, Err(Error::AlreadyVoted)));
        assert_eq!(votes_for(&storage, &a).await, 1);
        assert_eq!(votes_for(&storage, &b).await, 0);

        // Identical arguments are not a no-op either.
        let repeat = vote(&storage, voter, election.id, a.id).await;
        assert!(matches!(repeat, Err(Error::AlreadyVoted)));
        assert_eq!(votes_for(&storage, &a).await, 1);
    }

    #[rocket::async_test]
    async fn candidate_from_other_election_is_invalid() {
        let storage = Storage::memory();
        let election = add_election(&storage, ElectionCore::active_example()).await;
        let other = add_election(&storage, ElectionCore::active_example()).await;
        add_candidate(&storage, &election, "A").await;
        let stranger = add_candidate(&storage, &other, "Stranger").await;
        let voter = add_voter(&storage, UserCore::voter_example2()).await;

        let result = vote(&storage, voter, election.id, stranger.id).await;
        assert!(matches!(result, Err(Error::InvalidCandidate)));
        assert_eq!(votes_for(&storage, &stranger).await, 0);

        // Having voted in the candidate's own election changes nothing.
        vote(&storage, voter, other.id, stranger.id).await.unwrap();
        let result = vote(&storage, voter, election.id, stranger.id).await;
        assert!(matches!(result, Err(Error::InvalidCandidate)));
        assert_eq!(votes_for(&storage, &stranger).await, 1);
    }

    #[rocket::async_test]
    async fn unknown_voter_is_not_found() {
        let storage = Storage::memory();
        let election = add_election(&storage, ElectionCore::active_example()).await;
        let a = add_candidate(&storage, &election, "A").await;
        let ghost = Caller {
            id: Id::new(),
            rights: Rights::Voter,
        };

        let result = vote(&storage, ghost, election.id, a.id).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: Entity::Voter,
                ..
            })
        ));
        assert_eq!(votes_for(&storage, &a).await, 0);
    }

    #[rocket::async_test]
    async fn admins_cannot_vote() {
        let storage = Storage::memory();
        let election = add_election(&storage, ElectionCore::active_example()).await;
        let a = add_candidate(&storage, &election, "A").await;
        let admin = add_voter(&storage, UserCore::admin_example()).await;

        let result = vote(&storage, admin, election.id, a.id).await;
        assert!(matches!(result, Err(Error::Forbidden(_))));

        // The rights check comes before anything is looked up.
        let unknown_admin = Caller {
            id: Id::new(),
            rights: Rights::Admin,
        };
        let result = vote(&storage, unknown_admin, Id::new(), Id::new()).await;
        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[rocket::async_test]
    async fn voter_with_admin_record_is_not_a_voter() {
        let storage = Storage::memory();
        let election = add_election(&storage, ElectionCore::active_example()).await;
        let a = add_candidate(&storage, &election, "A").await;
        let admin = add_voter(&storage, UserCore::admin_example()).await;
        let forged = Caller {
            id: admin.id,
            rights: Rights::Voter,
        };

        let result = vote(&storage, forged, election.id, a.id).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: Entity::Voter,
                ..
            })
        ));
    }

    #[rocket::async_test]
    async fn checks_run_in_order() {
        let storage = Storage::memory();
        let election = add_election(&storage, ElectionCore::active_example()).await;
        let a = add_candidate(&storage, &election, "A").await;
        let voter = add_voter(&storage, UserCore::voter_example()).await;

        // Missing election beats missing candidate.
        let result = vote(&storage, voter, Id::new(), Id::new()).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: Entity::Election,
                ..
            })
        ));

        // Missing candidate.
        let result = vote(&storage, voter, election.id, Id::new()).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: Entity::Candidate,
                ..
            })
        ));

        // Once voted, the prior vote is reported before anything else.
        vote(&storage, voter, election.id, a.id).await.unwrap();
        let result = vote(&storage, voter, election.id, Id::new()).await;
        assert!(matches!(result, Err(Error::AlreadyVoted)));
    }

    #[rocket::async_test]
    async fn votes_outside_window_are_rejected() {
        let storage = Storage::memory();
        let voter = add_voter(&storage, UserCore::voter_example()).await;

        for (example, phase) in [
            (ElectionCore::upcoming_example(), ElectionPhase::Upcoming),
            (ElectionCore::ended_example(), ElectionPhase::Ended),
        ] {
            let election = add_election(&storage, example).await;
            let a = add_candidate(&storage, &election, "A").await;

            let result = vote(&storage, voter, election.id, a.id).await;
            assert!(matches!(result, Err(Error::ElectionNotActive(p)) if p == phase));
            assert_eq!(votes_for(&storage, &a).await, 0);
            assert!(!storage.has_voted(voter.id, election.id).await.unwrap());
        }
    }

    #[rocket::async_test]
    async fn window_can_be_left_open() {
        let storage = Storage::memory();
        let voter = add_voter(&storage, UserCore::voter_example()).await;
        let election = add_election(&storage, ElectionCore::ended_example()).await;
        let a = add_candidate(&storage, &election, "A").await;

        let policy = AdmissionPolicy {
            enforce_voting_window: false,
        };
        cast_vote(&*storage, policy, voter, election.id, a.id)
            .await
            .unwrap();
        assert_eq!(votes_for(&storage, &a).await, 1);
    }

    #[test]
    fn concurrent_duplicates_commit_once() {
        init_logging();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let storage = Storage::memory();
            let election = add_election(&storage, ElectionCore::active_example()).await;
            let a = add_candidate(&storage, &election, "A").await;
            let b = add_candidate(&storage, &election, "B").await;
            let voter = add_voter(&storage, UserCore::voter_example()).await;
            let election_id = election.id;

            let attempts = (0..10).map(|i| {
                let storage = storage.clone();
                // Mix the candidates; the pair (voter, election) is what counts.
                let candidate = if i % 2 == 0 { a.id } else { b.id };
                tokio::spawn(async move {
                    cast_vote(
                        &*storage,
                        AdmissionPolicy::default(),
                        voter,
                        election_id,
                        candidate,
                    )
                    .await
                })
            });
            let results: Vec<_> = join_all(attempts)
                .await
                .into_iter()
                .map(|joined| joined.unwrap())
                .collect();

            let committed = results.iter().filter(|r| r.is_ok()).count();
            let duplicates = results
                .iter()
                .filter(|r| matches!(r, Err(Error::AlreadyVoted)))
                .count();
            assert_eq!(committed, 1);
            assert_eq!(duplicates, 9);
            assert_eq!(votes_for(&storage, &a).await + votes_for(&storage, &b).await, 1);
        });
    }

    #[test]
    fn concurrent_voters_are_all_counted() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let storage = Storage::memory();
            let election = add_election(&storage, ElectionCore::active_example()).await;
            let a = add_candidate(&storage, &election, "A").await;

            let mut voters = Vec::new();
            for n in 0..50 {
                voters.push(add_voter(&storage, UserCore::numbered_voter(n)).await);
            }

            let (election_id, candidate_id) = (election.id, a.id);
            let attempts = voters.into_iter().map(|voter| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    cast_vote(
                        &*storage,
                        AdmissionPolicy::default(),
                        voter,
                        election_id,
                        candidate_id,
                    )
                    .await
                })
            });
            for joined in join_all(attempts).await {
                joined.unwrap().unwrap();
            }

            assert_eq!(votes_for(&storage, &a).await, 50);
        });
    }
}
