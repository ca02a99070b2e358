use actix_web::{dev::Payload, Error, FromRequest, HttpMessage, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::{ready, Ready};

use crate::error::ApiError;
use crate::models::{Id, UserIdentity};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    /// Moderators and admins make up the forum staff.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// `"<user id>:<username>"`
    pub sub: String,
    pub exp: usize,
    pub roles: Vec<Role>,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("JWT_SECRET not set")]
    MissingSecret,
    #[error("malformed subject '{0}'")]
    BadSubject(String),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl Claims {
    pub fn is_staff(&self) -> bool {
        self.roles.iter().any(Role::is_staff)
    }

    /// Splits the subject into the numeric user id and username.
    pub fn identity(&self) -> Result<UserIdentity, AuthError> {
        let (id, username) = self
            .sub
            .split_once(':')
            .ok_or_else(|| AuthError::BadSubject(self.sub.clone()))?;
        let id: Id = id
            .parse()
            .ok()
            .filter(|id: &Id| *id > 0)
            .ok_or_else(|| AuthError::BadSubject(self.sub.clone()))?;
        Ok(UserIdentity { id, username: username.to_string() })
    }
}

fn jwt_secret() -> Result<String, AuthError> {
    env::var("JWT_SECRET").map_err(|_| AuthError::MissingSecret)
}

/// Validate a JWT and return its claims.
pub fn decode_jwt(token: &str) -> Result<Claims, AuthError> {
    let secret = jwt_secret()?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Extractor yielding validated `Claims`.
pub struct Auth(pub Claims);

impl FromRequest for Auth {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        // Delegate to BearerAuth to parse the header.
        if let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() {
            return ready(match decode_jwt(bearer.token()) {
                Ok(claims) => Ok(Auth(claims)),
                Err(_) => Err(ApiError::Unauthorized.into()),
            });
        }
        ready(Err(ApiError::Unauthorized.into()))
    }
}

/// Extractor for handlers mounted behind `StaffGuard`; yields the identity it stored.
#[derive(Debug, Clone)]
pub struct StaffUser(pub UserIdentity);

impl FromRequest for StaffUser {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<UserIdentity>()
                .cloned()
                .map(StaffUser)
                .ok_or_else(|| ApiError::Unauthorized.into()),
        )
    }
}

/// Create a JWT for a user
pub fn create_jwt(user_id: Id, username: &str, roles: Vec<Role>) -> Result<String, AuthError> {
    let secret = jwt_secret()?;
    let expiration = (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize;

    let claims = Claims {
        sub: format!("{user_id}:{username}"),
        exp: expiration,
        roles,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}
