//! Identity extractors.
//!
//! Callers present an optional `Authorization: Bearer` token and an
//! optional `X-Session-ID` header. [`Identity`] resolves both leniently
//! (a bad token degrades to anonymous); [`RequireUser`] rejects
//! unauthenticated requests with 401.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use shopmate_core::{OwnerKey, SessionKey, UserId};

use crate::error::AppError;
use crate::services::credentials::{AuthError, TokenClaims};
use crate::state::AppState;

/// Header carrying the client's chat/cart session key.
pub const SESSION_HEADER: &str = "x-session-id";

/// The caller's resolved identity: an authenticated user, an anonymous
/// session key, either, or neither.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub user: Option<UserId>,
    pub session: Option<SessionKey>,
}

impl Identity {
    /// The owner key for cart operations.
    ///
    /// An authenticated user always owns their own cart; the session key
    /// only identifies anonymous callers.
    ///
    /// # Errors
    ///
    /// [`AppError::BadRequest`] when neither identity signal is present.
    pub fn owner(&self) -> Result<OwnerKey, AppError> {
        if let Some(user) = &self.user {
            return Ok(OwnerKey::user(user.clone()));
        }
        if let Some(session) = &self.session {
            return Ok(OwnerKey::anonymous(session.clone()));
        }
        Err(AppError::BadRequest(
            "missing identity: supply a bearer token or X-Session-ID header".to_string(),
        ))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
fn parse_bearer(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn session_header(parts: &Parts) -> Option<SessionKey> {
    parts
        .headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(SessionKey::new)
}

fn bearer_claims(parts: &Parts, state: &AppState) -> Result<TokenClaims, AuthError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::Missing)?;
    let token = parse_bearer(header).ok_or(AuthError::Invalid)?;
    state.credentials().verify(token)
}

impl<S> FromRequestParts<S> for Identity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        // An unverifiable token is treated as absent rather than fatal,
        // so expired logins fall back to anonymous browsing.
        let user = bearer_claims(parts, &app).ok().map(|claims| claims.subject);
        Ok(Self {
            user,
            session: session_header(parts),
        })
    }
}

/// Extractor that requires a verified bearer token.
pub struct RequireUser(pub TokenClaims);

impl<S> FromRequestParts<S> for RequireUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let claims = bearer_claims(parts, &app)?;
        Ok(Self(claims))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(parse_bearer("Bearer   spaced  "), Some("spaced"));
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer(""), None);
    }

    #[test]
    fn test_owner_prefers_user() {
        let identity = Identity {
            user: Some(UserId::new("u-1")),
            session: Some(SessionKey::new("s-1")),
        };
        assert_eq!(
            identity.owner().unwrap(),
            OwnerKey::user(UserId::new("u-1"))
        );
    }

    #[test]
    fn test_owner_falls_back_to_session() {
        let identity = Identity {
            user: None,
            session: Some(SessionKey::new("s-1")),
        };
        assert_eq!(
            identity.owner().unwrap(),
            OwnerKey::anonymous(SessionKey::new("s-1"))
        );
    }

    #[test]
    fn test_owner_requires_some_identity() {
        let identity = Identity::default();
        assert!(identity.owner().is_err());
    }
}
