use actix_web::{dev::Payload, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::{ready, Ready};
use tracing::debug;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Instructor,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub roles: Vec<Role>,
}

impl Claims {
    /// Identity votes and authorship are keyed on.
    pub fn viewer_id(&self) -> &str {
        &self.sub
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    /// May mark a discussion as the accepted solution.
    pub fn is_privileged(&self) -> bool {
        self.roles.iter().any(|r| matches!(r, Role::Instructor | Role::Admin))
    }

    /// Author of the resource or an admin.
    pub fn may_modify(&self, author_id: &str) -> bool {
        self.sub == author_id || self.is_admin()
    }
}

fn secret() -> Result<String, jsonwebtoken::errors::Error> {
    env::var("JWT_SECRET").map_err(|_| ErrorKind::InvalidKeyFormat.into())
}

/// Validate a JWT and return its claims.
fn decode_jwt(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let secret = secret()?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Extractor yielding validated `Claims`. Use `Option<Auth>` on routes that
/// also serve anonymous viewers.
pub struct Auth(pub Claims);

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let bearer = match BearerAuth::from_request(req, pl).into_inner() {
            Ok(bearer) => bearer,
            Err(_) => return ready(Err(ApiError::Unauthorized("authorization required"))),
        };
        ready(decode_jwt(bearer.token()).map(Auth).map_err(|e| {
            debug!(error = %e, "bearer token rejected");
            ApiError::Unauthorized("invalid token")
        }))
    }
}

/// Issue a 24h token for `subject`.
pub fn create_jwt(subject: &str, roles: Vec<Role>) -> Result<String, jsonwebtoken::errors::Error> {
    let secret = secret()?;
    let expiration = (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize;

    let claims = Claims {
        sub: subject.to_string(),
        exp: expiration,
        roles,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}
