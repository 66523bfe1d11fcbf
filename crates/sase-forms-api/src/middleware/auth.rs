//! JWT Authentication
//!
//! Sessions are issued elsewhere; this service only verifies bearer tokens
//! signed with the shared secret.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sase_forms::Identity;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // owner id
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: usize,
}

impl Claims {
    pub fn into_identity(self) -> Identity {
        Identity { user_id: self.sub, email: self.email, name: self.name }
    }
}

pub fn issue_token(
    secret: &str,
    ttl_hours: i64,
    identity: &Identity,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (chrono::Utc::now() + chrono::Duration::hours(ttl_hours)).timestamp().max(0) as usize;

    let claims = Claims {
        sub: identity.user_id,
        email: identity.email.clone(),
        name: identity.name.clone(),
        exp: expiration,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// A caller with a valid session. Rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or_else(ApiError::unauthorized)?;
        let claims = verify_token(&state.config.auth.jwt_secret, token).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            ApiError::unauthorized()
        })?;
        Ok(AuthUser(claims.into_identity()))
    }
}

/// The session if there is a valid one. Public endpoints use this and let
/// the form decide whether identity is needed.
#[derive(Debug, Clone, Default)]
pub struct MaybeAuthUser(pub Option<Identity>);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let identity = bearer(parts)
            .and_then(|token| verify_token(&state.config.auth.jwt_secret, token).ok())
            .map(Claims::into_identity);
        Ok(MaybeAuthUser(identity))
    }
}
