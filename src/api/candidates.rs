use rocket::{response::status, serde::json::Json, Route};

use crate::error::{Entity, Error, Result};
use crate::model::{
    api::{
        auth::{Admin, AnyRole, AuthToken},
        candidate::{CandidateDescription, CandidateEditSpec, CandidateSpec},
        vote::Message,
    },
    db::candidate::Candidate,
    mongodb::Id,
};
use crate::store::{CandidateRemoval, Storage};

pub fn routes() -> Vec<Route> {
    routes![
        get_candidates,
        get_candidate,
        election_candidates,
        create_candidate,
        modify_candidate,
        delete_candidate,
    ]
}

fn describe_all(candidates: Vec<Candidate>) -> Vec<CandidateDescription> {
    candidates.into_iter().map(Into::into).collect()
}

#[get("/candidates")]
async fn get_candidates(
    _token: AuthToken<AnyRole>,
    storage: Storage,
) -> Result<Json<Vec<CandidateDescription>>> {
    Ok(Json(describe_all(storage.list_candidates().await?)))
}

#[get("/candidates/<candidate_id>")]
async fn get_candidate(
    _token: AuthToken<AnyRole>,
    candidate_id: Id,
    storage: Storage,
) -> Result<Json<CandidateDescription>> {
    let candidate = storage
        .get_candidate(candidate_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Candidate, candidate_id))?;
    Ok(Json(candidate.into()))
}

/// Candidates of one election, in the order they were added.
#[get("/elections/<election_id>/candidates")]
async fn election_candidates(
    _token: AuthToken<AnyRole>,
    election_id: Id,
    storage: Storage,
) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates = storage
        .election_candidates(election_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Election, election_id))?;
    Ok(Json(describe_all(candidates)))
}

#[post("/candidates", data = "<spec>", format = "json")]
pub(crate) async fn create_candidate(
    token: AuthToken<Admin>,
    spec: Json<CandidateSpec>,
    storage: Storage,
) -> Result<status::Created<Json<CandidateDescription>>> {
    let election_id = spec.election_id;
    let candidate = storage
        .insert_candidate(spec.0.into_candidate()?)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Election, election_id))?;
    info!(
        "Admin {} added candidate {} to election {election_id}",
        token.id, candidate.id
    );

    let location = uri!(get_candidate(candidate.id)).to_string();
    Ok(status::Created::new(location).body(Json(candidate.into())))
}

#[put("/candidates/<candidate_id>", data = "<spec>", format = "json")]
async fn modify_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    spec: Json<CandidateEditSpec>,
    storage: Storage,
) -> Result<Json<CandidateDescription>> {
    let candidate = storage
        .update_candidate(candidate_id, spec.0.into_edit()?)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Candidate, candidate_id))?;
    Ok(Json(candidate.into()))
}

#[delete("/candidates/<candidate_id>")]
async fn delete_candidate(
    token: AuthToken<Admin>,
    candidate_id: Id,
    storage: Storage,
) -> Result<Json<Message>> {
    match storage.delete_candidate(candidate_id).await? {
        CandidateRemoval::Removed => {
            info!("Admin {} deleted candidate {candidate_id}", token.id);
            Ok(Json(Message::new("Candidate deleted successfully.")))
        }
        CandidateRemoval::NotFound => Err(Error::not_found(Entity::Candidate, candidate_id)),
        CandidateRemoval::HasVotes(votes) => Err(Error::BadRequest(format!(
            "Cannot delete candidate {candidate_id} with {votes} recorded votes"
        ))),
    }
}
