use std::fmt::{Display, Formatter};

use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request, Response,
};
use serde::Serialize;
use thiserror::Error;

use crate::logging::RequestTrace;
use crate::model::{common::election::ElectionPhase, mongodb::Id};

pub type Result<T> = std::result::Result<T, Error>;

/// The kinds of entity a request can reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Entity {
    Voter,
    Admin,
    Election,
    Candidate,
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Voter => "Voter",
            Self::Admin => "Admin",
            Self::Election => "Election",
            Self::Candidate => "Candidate",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("{entity} with ID '{id}' not found")]
    NotFound { entity: Entity, id: Id },
    #[error("You have already voted in this election")]
    AlreadyVoted,
    #[error("Candidate does not belong to this election")]
    InvalidCandidate,
    #[error("Election is {0}, votes can only be cast while it is active")]
    ElectionNotActive(ElectionPhase),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Failed to write report: {0}")]
    Report(#[from] csv::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(entity: Entity, id: Id) -> Self {
        Self::NotFound { entity, id }
    }

    /// The machine-readable name of this failure, as sent in response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "forbidden",
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyVoted => "already_voted",
            Self::InvalidCandidate => "invalid_candidate",
            Self::ElectionNotActive(_) => "election_not_active",
            Self::BadRequest(_) => "bad_request",
            Self::Db(_) => "transient",
            Self::Jwt(_) | Self::Report(_) | Self::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Forbidden(_) => Status::Forbidden,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::NotFound { .. } => Status::NotFound,
            Self::AlreadyVoted => Status::Conflict,
            Self::InvalidCandidate | Self::BadRequest(_) => Status::BadRequest,
            Self::ElectionNotActive(_) => Status::UnprocessableEntity,
            Self::Db(_) => Status::ServiceUnavailable,
            Self::Jwt(_) | Self::Report(_) | Self::Internal(_) => Status::InternalServerError,
        }
    }
}

/// Body sent alongside every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(error: &Error) -> Self {
        Self {
            error: error.kind(),
            message: error.to_string(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let id = RequestTrace::of(req).id;
        if status.code >= 500 {
            error!("req{id} {} {}: {self}", req.method(), req.uri());
        } else {
            warn!("req{id} {} {}: {self}", req.method(), req.uri());
        }

        Response::build_from(Json(ErrorBody::from(&self)).respond_to(req)?)
            .status(status)
            .ok()
    }
}
