//! Cart and chat-session ownership.
//!
//! A cart or chat session belongs to exactly one owner: an authenticated
//! user or an anonymous session. Modelling this as a tagged union makes
//! the "exactly one of `user_id`/`session_id` is set" invariant a
//! type-level guarantee instead of two nullable fields.

use serde::{Deserialize, Serialize};

use super::id::{SessionKey, UserId};

/// The owner of a cart or chat session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OwnerKey {
    /// Owned by an authenticated user.
    User { user_id: UserId },
    /// Owned by an anonymous session.
    Anonymous { session_key: SessionKey },
}

impl OwnerKey {
    /// Owner key for an authenticated user.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self::User { user_id }
    }

    /// Owner key for an anonymous session.
    #[must_use]
    pub const fn anonymous(session_key: SessionKey) -> Self {
        Self::Anonymous { session_key }
    }

    /// Whether this owner is an anonymous session.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous { .. })
    }

    /// The user ID, if the owner is an authenticated user.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::User { user_id } => Some(user_id),
            Self::Anonymous { .. } => None,
        }
    }

    /// The session key, if the owner is anonymous.
    #[must_use]
    pub const fn session_key(&self) -> Option<&SessionKey> {
        match self {
            Self::Anonymous { session_key } => Some(session_key),
            Self::User { .. } => None,
        }
    }
}

impl std::fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User { user_id } => write!(f, "user:{user_id}"),
            Self::Anonymous { session_key } => write!(f, "session:{session_key}"),
        }
    }
}
