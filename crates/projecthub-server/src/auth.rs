//! Bearer token issuing and verification (HS256).

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use projecthub_core::{AppConfig, HubError, HubResult};
use projecthub_domain::AuthenticatedPrincipal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

const MAX_TTL_MINUTES: u64 = 60 * 24 * 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Fails when no secret is configured.
    pub fn from_config(config: &AppConfig) -> HubResult<Self> {
        // Tokens never outlive a year, whatever the config says.
        let minutes = config.auth.token_ttl_minutes.min(MAX_TTL_MINUTES) as i64;
        Ok(Self::new(config.jwt_secret()?, Duration::minutes(minutes)))
    }

    pub fn issue(&self, principal: &AuthenticatedPrincipal) -> HubResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal.user_id,
            name: principal.name.clone(),
            roles: principal.roles.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| HubError::Internal(format!("cannot sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> HubResult<AuthenticatedPrincipal> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| HubError::Unauthorized(format!("invalid bearer token: {}", e)))?;
        let claims = data.claims;
        Ok(AuthenticatedPrincipal::new(
            claims.sub,
            claims.name,
            claims.roles,
        ))
    }
}

fn bearer_token(parts: &Parts) -> HubResult<&str> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| HubError::Unauthorized("missing Authorization header".into()))?
        .to_str()
        .map_err(|_| HubError::Unauthorized("malformed Authorization header".into()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| HubError::Unauthorized("expected a Bearer token".into()))
}

/// The caller of the current request, decoded from its bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthenticatedPrincipal);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let principal = state.keys.verify(token)?;
        Ok(Self(principal))
    }
}
