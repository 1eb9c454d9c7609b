use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

use super::auth::OptionalAuth;
use crate::models::CartOwner;
use crate::AppState;

pub const SESSION_HEADER: &str = "x-session-id";

/// Cart identity of the caller: the signed-in shopper, else the guest
/// session from `X-Session-Id`, else nobody.
#[derive(Debug, Clone)]
pub struct CartIdentity(pub Option<CartOwner>);

impl CartIdentity {
    /// Owner required for cart writes.
    pub fn require(self) -> Result<CartOwner, AppError> {
        self.0
            .ok_or_else(|| AppError::bad_request("Session ID required for guest users"))
    }
}

pub fn session_id(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CartIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let OptionalAuth(user) = OptionalAuth::from_request_parts(parts, state).await?;
        let owner = match user {
            Some(user) => Some(CartOwner::User(user.clerk_id)),
            None => session_id(parts).map(CartOwner::Guest),
        };
        Ok(CartIdentity(owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_session_header_is_ignored() {
        let (parts, _) = axum::http::Request::builder()
            .header(SESSION_HEADER, "   ")
            .body(())
            .unwrap()
            .into_parts();
        assert!(session_id(&parts).is_none());

        let err = CartIdentity(None).require().unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Session ID required for guest users");
    }

    #[test]
    fn session_header_is_trimmed() {
        let (parts, _) = axum::http::Request::builder()
            .header("X-Session-Id", " guest-abc ")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(session_id(&parts).as_deref(), Some("guest-abc"));
    }
}
