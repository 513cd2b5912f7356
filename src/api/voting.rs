use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::{Entity, Error, Result};
use crate::model::api::{
    auth::{AnyRole, AuthToken, Voter},
    vote::{Message, VoteRequest},
};
use crate::store::Storage;
use crate::voting::{cast_vote, AdmissionPolicy};

pub fn routes() -> Vec<Route> {
    routes![vote, voted_elections]
}

/// Any authenticated caller may attempt a vote; admission decides whether
/// their rights allow it.
#[post("/vote", data = "<choice>", format = "json")]
async fn vote(
    token: AuthToken<AnyRole>,
    choice: Json<VoteRequest>,
    storage: Storage,
    config: &State<Config>,
) -> Result<Json<Message>> {
    cast_vote(
        &*storage,
        AdmissionPolicy::from(config.inner()),
        token.caller(),
        choice.election_id,
        choice.candidate_id,
    )
    .await?;
    Ok(Json(Message::new("Vote cast successfully.")))
}

/// IDs of the elections the caller has voted in.
#[get("/voter/votes")]
async fn voted_elections(token: AuthToken<Voter>, storage: Storage) -> Result<Json<Vec<String>>> {
    let voter = storage
        .get_voter(token.id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Voter, token.id))?;
    let mut elections: Vec<_> = voter.voted_elections.iter().copied().collect();
    elections.sort();
    Ok(Json(elections.iter().map(ToString::to_string).collect()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        futures::future::join_all,
        http::{Cookie, Status},
        local::asynchronous::Client,
    };

    use super::*;

    use crate::api::test_utils::{create_candidate, create_election, expect_error, login};
    use crate::model::{
        api::{
            candidate::{CandidateDescription, CandidateSpec},
            election::{ElectionDescription, ElectionSpec},
        },
        db::user::UserCore,
    };

    /// An active election with two candidates, created by a fresh admin.
    async fn board(
        client: &Client,
        storage: &Storage,
    ) -> (ElectionDescription, CandidateDescription, CandidateDescription) {
        let (_, admin) = login(client, storage, UserCore::admin_example()).await;
        let election = create_election(client, &admin, &ElectionSpec::current_example()).await;
        let a = create_candidate(client, &admin, &CandidateSpec::example(election.id)).await;
        let b = create_candidate(client, &admin, &CandidateSpec::example2(election.id)).await;
        (election, a, b)
    }

    fn ballot(election: &ElectionDescription, candidate: &CandidateDescription) -> VoteRequest {
        VoteRequest {
            election_id: election.id,
            candidate_id: candidate.id,
        }
    }

    async fn tally(storage: &Storage, candidate: &CandidateDescription) -> u64 {
        storage
            .get_candidate(candidate.id)
            .await
            .unwrap()
            .unwrap()
            .votes
    }

    #[backend_test(voter)]
    async fn vote_once(client: Client, auth: Cookie<'static>, storage: Storage) {
        let (election, a, b) = board(&client, &storage).await;

        let response = client
            .post(uri!(vote))
            .cookie(auth.clone())
            .json(&ballot(&election, &a))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let message: Message = response.into_json().await.unwrap();
        assert_eq!(message.message, "Vote cast successfully.");

        let response = client
            .post(uri!(vote))
            .cookie(auth.clone())
            .json(&ballot(&election, &b))
            .dispatch()
            .await;
        expect_error(response, Status::Conflict, "already_voted").await;

        assert_eq!(tally(&storage, &a).await, 1);
        assert_eq!(tally(&storage, &b).await, 0);

        let response = client
            .get(uri!(voted_elections))
            .cookie(auth)
            .dispatch()
            .await;
        let voted: Vec<String> = response.into_json().await.unwrap();
        assert_eq!(voted, [election.id.to_string()]);
    }

    #[backend_test(voter)]
    async fn cross_election_votes_are_invalid(
        client: Client,
        auth: Cookie<'static>,
        storage: Storage,
    ) {
        let (election, _, _) = board(&client, &storage).await;
        let other = storage
            .insert_election(crate::model::db::election::ElectionCore::active_example())
            .await
            .unwrap();
        let stranger = storage
            .insert_candidate(crate::model::db::candidate::CandidateCore::new(
                "Stranger".to_string(),
                String::new(),
                other.id,
            ))
            .await
            .unwrap()
            .unwrap();

        let response = client
            .post(uri!(vote))
            .cookie(auth)
            .json(&VoteRequest {
                election_id: election.id,
                candidate_id: stranger.id,
            })
            .dispatch()
            .await;
        expect_error(response, Status::BadRequest, "invalid_candidate").await;
        assert_eq!(
            storage.get_candidate(stranger.id).await.unwrap().unwrap().votes,
            0
        );
    }

    #[backend_test(admin)]
    async fn admins_cannot_vote(client: Client, auth: Cookie<'static>, storage: Storage) {
        let election = create_election(&client, &auth, &ElectionSpec::current_example()).await;
        let a = create_candidate(&client, &auth, &CandidateSpec::example(election.id)).await;

        let response = client
            .post(uri!(vote))
            .cookie(auth.clone())
            .json(&ballot(&election, &a))
            .dispatch()
            .await;
        expect_error(response, Status::Forbidden, "forbidden").await;
        assert_eq!(tally(&storage, &a).await, 0);

        let response = client
            .get(uri!(voted_elections))
            .cookie(auth)
            .dispatch()
            .await;
        expect_error(response, Status::Forbidden, "forbidden").await;
    }

    #[backend_test(voter)]
    async fn unknown_targets_are_not_found(client: Client, auth: Cookie<'static>, storage: Storage) {
        let (election, a, _) = board(&client, &storage).await;

        let response = client
            .post(uri!(vote))
            .cookie(auth.clone())
            .json(&VoteRequest {
                election_id: crate::model::mongodb::Id::new(),
                candidate_id: a.id,
            })
            .dispatch()
            .await;
        expect_error(response, Status::NotFound, "not_found").await;

        let response = client
            .post(uri!(vote))
            .cookie(auth)
            .json(&VoteRequest {
                election_id: election.id,
                candidate_id: crate::model::mongodb::Id::new(),
            })
            .dispatch()
            .await;
        expect_error(response, Status::NotFound, "not_found").await;
    }

    #[backend_test(voter)]
    async fn closed_elections_reject_votes(client: Client, auth: Cookie<'static>, storage: Storage) {
        let (_, admin) = login(&client, &storage, UserCore::admin_example()).await;
        let election = create_election(&client, &admin, &ElectionSpec::past_example()).await;
        let a = create_candidate(&client, &admin, &CandidateSpec::example(election.id)).await;

        let response = client
            .post(uri!(vote))
            .cookie(auth)
            .json(&ballot(&election, &a))
            .dispatch()
            .await;
        expect_error(response, Status::UnprocessableEntity, "election_not_active").await;
        assert_eq!(tally(&storage, &a).await, 0);
    }

    #[backend_test]
    async fn votes_need_a_token(client: Client, storage: Storage) {
        let (election, a, _) = board(&client, &storage).await;
        let response = client
            .post(uri!(vote))
            .json(&ballot(&election, &a))
            .dispatch()
            .await;
        expect_error(response, Status::Unauthorized, "unauthorized").await;
        assert_eq!(tally(&storage, &a).await, 0);
    }

    async fn race_ten_ballots(client: &Client, auth: &Cookie<'static>, storage: &Storage) {
        let (election, a, b) = board(client, storage).await;

        let requests = (0..10).map(|i| {
            let candidate = if i % 2 == 0 { &a } else { &b };
            client
                .post(uri!(vote))
                .cookie(auth.clone())
                .json(&ballot(&election, candidate))
                .dispatch()
        });
        let statuses: Vec<Status> = join_all(requests)
            .await
            .into_iter()
            .map(|response| response.status())
            .collect();

        let ok = statuses.iter().filter(|s| **s == Status::Ok).count();
        let conflicts = statuses.iter().filter(|s| **s == Status::Conflict).count();
        assert_eq!(ok, 1, "unexpected statuses {statuses:?}");
        assert_eq!(conflicts, 9, "unexpected statuses {statuses:?}");
        assert_eq!(tally(storage, &a).await + tally(storage, &b).await, 1);
    }

    #[backend_test(voter)]
    async fn concurrent_requests_admit_one_vote(
        client: Client,
        auth: Cookie<'static>,
        storage: Storage,
    ) {
        race_ten_ballots(&client, &auth, &storage).await;
    }

    #[backend_test(mongodb, voter)]
    async fn concurrent_requests_admit_one_vote_in_mongodb(
        client: Client,
        auth: Cookie<'static>,
        storage: Storage,
    ) {
        race_ten_ballots(&client, &auth, &storage).await;
    }
}
