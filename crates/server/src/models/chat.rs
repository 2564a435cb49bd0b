//! Chat sessions and their append-only message history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use shopmate_core::{CartId, ChatRole, ChatSessionId, OwnerKey, SessionKey};

/// A single message in a conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a message stamped with the current time.
    #[must_use]
    pub fn now(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The `{role, content}` projection handed to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: ChatRole,
    pub content: String,
}

/// A conversation between one owner and the assistant.
///
/// `key` is the client-visible session identifier: it routes streaming
/// tokens and, for anonymous owners, doubles as the cart owner key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: ChatSessionId,
    pub key: SessionKey,
    pub owner: OwnerKey,
    pub messages: Vec<ChatMessage>,
    /// Weak link to the owner's cart at session-creation time.
    #[serde(default)]
    pub cart_id: Option<CartId>,
    /// Set iff the owner is anonymous.
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create a session for an owner under a fresh or supplied key.
    ///
    /// Anonymous sessions get `expiry_date = now + ttl`; authenticated
    /// sessions never expire through this mechanism.
    #[must_use]
    pub fn new(key: SessionKey, owner: OwnerKey, cart_id: Option<CartId>, ttl: Duration) -> Self {
        let now = Utc::now();
        let expiry_date = owner.is_anonymous().then(|| now + ttl);
        Self {
            id: ChatSessionId::generate(),
            key,
            owner,
            messages: Vec::new(),
            cart_id,
            expiry_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether an anonymous session has outlived its TTL.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= now)
    }

    /// Append a message; history is append-only and never edited.
    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Chronological `{role, content}` history for the completion task.
    #[must_use]
    pub fn llm_history(&self) -> Vec<LlmMessage> {
        self.messages
            .iter()
            .map(|message| LlmMessage {
                role: message.role,
                content: message.content.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use shopmate_core::UserId;

    #[test]
    fn test_anonymous_session_carries_expiry() {
        let key = SessionKey::generate();
        let session = ChatSession::new(
            key.clone(),
            OwnerKey::anonymous(key),
            None,
            Duration::days(14),
        );
        let expiry = session.expiry_date.unwrap();
        let expected = session.created_at + Duration::days(14);
        assert_eq!(expiry, expected);
    }

    #[test]
    fn test_authenticated_session_never_expires() {
        let session = ChatSession::new(
            SessionKey::generate(),
            OwnerKey::user(UserId::new("u-1")),
            None,
            Duration::days(14),
        );
        assert!(session.expiry_date.is_none());
        assert!(!session.is_expired(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn test_is_expired() {
        let key = SessionKey::generate();
        let session = ChatSession::new(
            key.clone(),
            OwnerKey::anonymous(key),
            None,
            Duration::days(1),
        );
        assert!(!session.is_expired(Utc::now()));
        assert!(session.is_expired(Utc::now() + Duration::days(2)));
    }

    #[test]
    fn test_llm_history_in_order() {
        let key = SessionKey::generate();
        let mut session = ChatSession::new(
            key.clone(),
            OwnerKey::anonymous(key),
            None,
            Duration::days(14),
        );
        session.push_message(ChatMessage::now(ChatRole::Assistant, "hello"));
        session.push_message(ChatMessage::now(ChatRole::User, "hi"));

        let history = session.llm_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::Assistant);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].role, ChatRole::User);
    }
}
