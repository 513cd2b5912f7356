use rocket::{response::status, serde::json::Json, Route};

use crate::error::{Entity, Error, Result};
use crate::model::{
    api::{
        auth::{Admin, AnyRole, AuthToken},
        election::{ElectionDescription, ElectionSpec, ElectionSummary},
        vote::Message,
    },
    mongodb::Id,
};
use crate::store::Storage;

pub fn routes() -> Vec<Route> {
    routes![
        get_elections,
        get_election,
        create_election,
        modify_election,
        delete_election,
    ]
}

#[get("/elections")]
async fn get_elections(
    _token: AuthToken<AnyRole>,
    storage: Storage,
) -> Result<Json<Vec<ElectionSummary>>> {
    let elections = storage.list_elections().await?;
    Ok(Json(elections.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>")]
async fn get_election(
    _token: AuthToken<AnyRole>,
    election_id: Id,
    storage: Storage,
) -> Result<Json<ElectionDescription>> {
    let election = storage
        .get_election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Election, election_id))?;
    Ok(Json(election.into()))
}

#[post("/elections", data = "<spec>", format = "json")]
pub(crate) async fn create_election(
    token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    storage: Storage,
) -> Result<status::Created<Json<ElectionDescription>>> {
    let election = storage.insert_election(spec.0.into_election()?).await?;
    info!("Admin {} created election {}", token.id, election.id);

    let location = uri!(get_election(election.id)).to_string();
    Ok(status::Created::new(location).body(Json(election.into())))
}

#[put("/elections/<election_id>", data = "<spec>", format = "json")]
async fn modify_election(
    token: AuthToken<Admin>,
    election_id: Id,
    spec: Json<ElectionSpec>,
    storage: Storage,
) -> Result<Json<ElectionDescription>> {
    let election = storage
        .update_election(election_id, spec.0.into_edit()?)
        .await?
        .ok_or_else(|| Error::not_found(Entity::Election, election_id))?;
    info!("Admin {} modified election {election_id}", token.id);
    Ok(Json(election.into()))
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    token: AuthToken<Admin>,
    election_id: Id,
    storage: Storage,
) -> Result<Json<Message>> {
    if !storage.delete_election(election_id).await? {
        return Err(Error::not_found(Entity::Election, election_id));
    }
    info!("Admin {} deleted election {election_id}", token.id);
    Ok(Json(Message::new("Election deleted successfully.")))
}
