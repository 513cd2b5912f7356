//! Helpers shared by the route tests.

use rocket::{
    http::{ContentType, Cookie, Status},
    local::asynchronous::{Client, LocalResponse},
    serde::json::Value,
};

use crate::config::Config;
use crate::model::{
    api::{
        auth::{AnyRole, AuthToken},
        candidate::{CandidateDescription, CandidateSpec},
        election::{ElectionDescription, ElectionSpec},
    },
    db::user::{User, UserCore},
};
use crate::store::Storage;

/// Create an account and mint a cookie for it.
pub async fn login(client: &Client, storage: &Storage, user: UserCore) -> (User, Cookie<'static>) {
    let user = storage.insert_user(user).await.unwrap();
    let config = client.rocket().state::<Config>().unwrap();
    let cookie = AuthToken::<AnyRole>::new(&user)
        .into_cookie(config)
        .unwrap();
    (user, cookie)
}

/// The `error` kind of a failed response, after checking its status.
pub async fn expect_error(response: LocalResponse<'_>, status: Status, kind: &str) {
    assert_eq!(response.status(), status);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["error"], kind, "unexpected body {body}");
}

pub async fn create_election(
    client: &Client,
    auth: &Cookie<'static>,
    spec: &ElectionSpec,
) -> ElectionDescription {
    let response = client
        .post(uri!(crate::api::elections::create_election))
        .header(ContentType::JSON)
        .cookie(auth.clone())
        .json(spec)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    response.into_json().await.unwrap()
}

pub async fn create_candidate(
    client: &Client,
    auth: &Cookie<'static>,
    spec: &CandidateSpec,
) -> CandidateDescription {
    let response = client
        .post(uri!(crate::api::candidates::create_candidate))
        .header(ContentType::JSON)
        .cookie(auth.clone())
        .json(spec)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    response.into_json().await.unwrap()
}
