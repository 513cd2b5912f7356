use rocket::{serde::json::Json, Catcher, Request, Route};

use crate::error::ErrorBody;
use crate::model::api::auth::AuthRejection;

mod candidates;
mod elections;
mod health;
mod results;
mod voting;

#[cfg(test)]
pub(crate) mod test_utils;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(health::routes());
    routes.extend(elections::routes());
    routes.extend(candidates::routes());
    routes.extend(voting::routes());
    routes.extend(results::routes());
    routes
}

/// Catchers that keep failures outside our handlers in the same JSON shape
/// as [`crate::error::Error`] responses.
pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        unprocessable,
        internal_error,
        unavailable
    ]
}

/// The message a request guard left behind, or `default`.
fn rejection(req: &Request<'_>, default: &str) -> String {
    req.local_cache(|| AuthRejection(None))
        .0
        .clone()
        .unwrap_or_else(|| default.to_string())
}

#[catch(400)]
fn bad_request(req: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "bad_request",
        message: rejection(req, "Malformed request"),
    })
}

#[catch(401)]
fn unauthorized(req: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "unauthorized",
        message: rejection(req, "Authentication required"),
    })
}

#[catch(403)]
fn forbidden(req: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "forbidden",
        message: rejection(req, "Insufficient rights"),
    })
}

#[catch(404)]
fn not_found(req: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "not_found",
        message: format!("No resource at {} {}", req.method(), req.uri()),
    })
}

/// Request bodies that parse as JSON but not as the expected type.
#[catch(422)]
fn unprocessable(_req: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "bad_request",
        message: "Request body does not match the expected shape".to_string(),
    })
}

#[catch(500)]
fn internal_error(req: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "internal",
        message: rejection(req, "Internal server error"),
    })
}

#[catch(503)]
fn unavailable(req: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "transient",
        message: rejection(req, "Service temporarily unavailable"),
    })
}
