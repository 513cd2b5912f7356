use rocket::{serde::json::Json, Route};
use serde::{Deserialize, Serialize};

pub fn routes() -> Vec<Route> {
    routes![health]
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    status: String,
    message: String,
}

#[get("/health")]
fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use super::*;

    #[backend_test]
    async fn health_needs_no_auth(client: Client) {
        let response = client.get(uri!(health)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let health: Health = response.into_json().await.unwrap();
        assert_eq!(health.status, "ok");
    }

    #[backend_test]
    async fn unknown_routes_are_json(client: Client) {
        let response = client.get("/nowhere").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let body: rocket::serde::json::Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], "not_found");
    }
}
