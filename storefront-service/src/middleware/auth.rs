//! Bearer authentication against Clerk.
//!
//! Outside production a `clerkId:<id>` token is accepted as-is so local
//! clients can act as any shopper. Otherwise the token must be a Clerk
//! session JWT signed with the configured RS256 key.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::error::AppError;

use crate::config::Config;
use crate::AppState;

const DEV_TOKEN_PREFIX: &str = "clerkId:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub clerk_id: String,
}

#[derive(Debug, Deserialize)]
struct ClerkClaims {
    sub: String,
}

/// The raw token from an `Authorization: Bearer` header.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve a bearer token to the Clerk user it identifies.
pub fn authenticate(token: &str, config: &Config) -> Result<AuthUser, AppError> {
    if !config.environment.is_production() {
        if let Some(clerk_id) = token.strip_prefix(DEV_TOKEN_PREFIX) {
            if clerk_id.is_empty() {
                return Err(AppError::unauthorized("Invalid token"));
            }
            return Ok(AuthUser {
                clerk_id: clerk_id.to_string(),
            });
        }
    }

    if !config.auth.has_jwt_key() {
        tracing::warn!("Bearer token received but no Clerk public key is configured");
        return Err(AppError::unauthorized("Invalid token"));
    }

    let key = DecodingKey::from_rsa_pem(config.auth.clerk_jwt_public_key.expose_secret().as_bytes())?;
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_aud = false;

    let data = decode::<ClerkClaims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::InvalidToken(e)
    })?;

    Ok(AuthUser {
        clerk_id: data.claims.sub,
    })
}

/// Rejects the request unless it carries a valid bearer token.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthUser);

/// Authenticates when a token is present; anonymous requests pass through.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<AuthUser>);

/// An authenticated user listed in `auth.admin_user_ids`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| AppError::unauthorized("No token provided"))?;
        let user = authenticate(token, &state.config)?;
        tracing::Span::current().record("clerk_id", user.clerk_id.as_str());
        Ok(RequireAuth(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = bearer_token(parts).and_then(|token| match authenticate(token, &state.config) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid optional bearer token");
                None
            }
        });
        Ok(OptionalAuth(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !state.config.auth.is_admin(&user.clerk_id) {
            tracing::warn!(clerk_id = %user.clerk_id, "Non-admin attempted admin access");
            return Err(AppError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}
