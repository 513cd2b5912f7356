use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Entity, Error, Result};
use crate::model::{common::rights::Rights, db::user::User, mongodb::{serde_hex, Id}};
use crate::store::Storage;
use crate::voting::Caller;

use super::role::Role;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

const BEARER_PREFIX: &str = "Bearer ";

/// An authentication token representing a specific user with specific rights.
/// `R` restricts which rights a request guard accepts.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<R> {
    #[serde(with = "serde_hex")]
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<R>,
}

impl<R> AuthToken<R> {
    /// Create a token for the given user, carrying the rights of their account.
    pub fn new(user: &User) -> Self {
        Self {
            id: user.id,
            rights: user.role,
            phantom: PhantomData,
        }
    }

    /// The identity this token vouches for.
    pub fn caller(&self) -> Caller {
        Caller {
            id: self.id,
            rights: self.rights,
        }
    }

    /// Sign this token into a JWT that expires after the configured TTL.
    pub fn encode(self, config: &Config) -> Result<String> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;
        Ok(token)
    }

    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let token = self.encode(config)?;
        Ok(Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Verify and deserialize a JWT.
    pub fn decode(token: &str, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<R>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<R> {
    #[serde(flatten, bound = "")]
    token: AuthToken<R>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// The message of the last authentication failure on a request, for the
/// error catchers to report.
pub struct AuthRejection(pub Option<String>);

fn reject<T>(req: &Request<'_>, error: Error) -> Outcome<T, Error> {
    let message = error.to_string();
    req.local_cache(|| AuthRejection(Some(message)));
    Outcome::Failure((error.status(), error))
}

/// The raw token, from the cookie if present, else the bearer header.
fn raw_token(req: &Request<'_>) -> Option<String> {
    if let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix(BEARER_PREFIX))
        .map(|token| token.trim().to_string())
}

#[rocket::async_trait]
impl<'r, R> FromRequest<'r> for AuthToken<R>
where
    R: Role,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the request and verify that it has the rights
    /// required by `R`.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Outcome::Success(config) = req.guard::<&State<Config>>().await else {
            return reject(req, Error::Internal("Config is not managed".to_string()));
        };

        let Some(raw) = raw_token(req) else {
            return reject(req, Error::Unauthorized("Missing auth token".to_string()));
        };

        let token = match Self::decode(&raw, config) {
            Ok(token) => token,
            Err(e) => return reject(req, Error::Unauthorized(format!("Invalid auth token: {e}"))),
        };

        if let Some(required) = R::RIGHTS {
            if token.rights != required {
                return reject(req, Error::Forbidden(format!("{required} rights required")));
            }
        }

        // Admin actions need a live admin account behind the token.
        if token.rights == Rights::Admin {
            let Outcome::Success(storage) = req.guard::<Storage>().await else {
                return reject(req, Error::Internal("Storage is not managed".to_string()));
            };
            match storage.get_user(token.id).await {
                Ok(Some(user)) if user.role == Rights::Admin => {}
                Ok(_) => {
                    let missing = Error::not_found(Entity::Admin, token.id);
                    return reject(req, Error::Unauthorized(missing.to_string()));
                }
                Err(e) => return reject(req, e),
            }
        }

        Outcome::Success(token)
    }
}
