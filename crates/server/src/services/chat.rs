//! Chat assistant workflow: session resolution, message submission, and
//! background completion.
//!
//! `submit_message` returns as soon as the user's message is persisted;
//! the completion runs on a spawned task that publishes tokens through
//! the [`StreamBroker`](super::broker::StreamBroker) and always closes
//! the turn with a terminal stream item.

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{error, instrument};

use shopmate_core::{ChatRole, OwnerKey, SessionKey, UserId};

use crate::models::{ChatMessage, ChatSession};
use crate::store::{DocumentStore, RepositoryError};

use super::broker::{StreamBroker, StreamItem};
use super::completion::CompletionService;

/// Errors surfaced by the chat workflow.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The referenced session does not exist, has expired, or belongs to
    /// another user.
    #[error("chat session not found")]
    SessionNotFound,
}

/// Chat workflow over the document store and completion backend.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn DocumentStore>,
    completion: Arc<dyn CompletionService>,
    broker: StreamBroker,
    anonymous_ttl: Duration,
    greeting: String,
}

impl ChatService {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        completion: Arc<dyn CompletionService>,
        broker: StreamBroker,
        anonymous_ttl: Duration,
        greeting: impl Into<String>,
    ) -> Self {
        Self {
            store,
            completion,
            broker,
            anonymous_ttl,
            greeting: greeting.into(),
        }
    }

    /// The broker routing this service's token streams.
    #[must_use]
    pub const fn broker(&self) -> &StreamBroker {
        &self.broker
    }

    /// Look up a session by its client-visible key.
    ///
    /// # Errors
    ///
    /// [`ChatError::SessionNotFound`] when absent, expired, or owned by
    /// a user other than `user`.
    pub async fn get_session(
        &self,
        key: &SessionKey,
        user: Option<&UserId>,
    ) -> Result<ChatSession, ChatError> {
        let session = self
            .store
            .get_session_by_key(key)
            .await?
            .ok_or(ChatError::SessionNotFound)?;
        if session.is_expired(Utc::now()) {
            return Err(ChatError::SessionNotFound);
        }
        if let Some(owner_id) = session.owner.user_id() {
            if user != Some(owner_id) {
                return Err(ChatError::SessionNotFound);
            }
        }
        Ok(session)
    }

    /// Resolve the caller's session, creating one when none exists.
    ///
    /// An explicitly supplied key must resolve; a missing or expired key
    /// is an error rather than a silent re-mint, so clients notice the
    /// reset. Without a key, an authenticated caller gets their existing
    /// session or a fresh one; an anonymous caller always gets a fresh
    /// session under a generated key.
    ///
    /// # Errors
    ///
    /// [`ChatError::SessionNotFound`] for an unresolvable explicit key,
    /// [`ChatError::Repository`] on store failure.
    pub async fn resolve_or_create(
        &self,
        user: Option<&UserId>,
        key: Option<&SessionKey>,
    ) -> Result<ChatSession, ChatError> {
        if let Some(key) = key {
            return self.get_session(key, user).await;
        }

        if let Some(user_id) = user {
            if let Some(session) = self.store.find_session_by_user(user_id).await? {
                return Ok(session);
            }
            return self
                .mint(SessionKey::generate(), OwnerKey::user(user_id.clone()))
                .await;
        }

        let key = SessionKey::generate();
        let owner = OwnerKey::anonymous(key.clone());
        self.mint(key, owner).await
    }

    async fn mint(&self, key: SessionKey, owner: OwnerKey) -> Result<ChatSession, ChatError> {
        let cart_id = self
            .store
            .find_cart_by_owner(&owner)
            .await?
            .map(|cart| cart.id);
        let mut session = ChatSession::new(key, owner, cart_id, self.anonymous_ttl);
        session.push_message(ChatMessage::now(ChatRole::Assistant, self.greeting.clone()));
        self.store.insert_session(&session).await?;
        Ok(session)
    }

    /// Persist a user message and kick off the assistant's response.
    ///
    /// Returns once the user message is stored; tokens arrive through
    /// the broker channel for `session.key`.
    ///
    /// # Errors
    ///
    /// [`ChatError::SessionNotFound`] for an unknown or expired session.
    #[instrument(skip(self, content), fields(session = %key))]
    pub async fn submit_message(
        &self,
        key: &SessionKey,
        user: Option<&UserId>,
        content: String,
    ) -> Result<(), ChatError> {
        let session = self.get_session(key, user).await?;
        self.store
            .append_message(&session.key, &ChatMessage::now(ChatRole::User, content))
            .await?;

        let service = self.clone();
        let key = session.key;
        tokio::spawn(async move {
            service.run_completion(key).await;
        });
        Ok(())
    }

    async fn run_completion(&self, key: SessionKey) {
        // Re-fetch so the history includes the message just appended.
        let history = match self.store.get_session_by_key(&key).await {
            Ok(Some(session)) => session.llm_history(),
            Ok(None) => {
                self.broker
                    .publish(&key, StreamItem::Error("session disappeared".to_owned()));
                self.broker.publish(&key, StreamItem::Done);
                return;
            }
            Err(e) => {
                error!(session = %key, error = %e, "history fetch failed");
                self.broker
                    .publish(&key, StreamItem::Error(e.to_string()));
                self.broker.publish(&key, StreamItem::Done);
                return;
            }
        };

        let broker = self.broker.clone();
        let token_key = key.clone();
        let on_token = move |token: &str| {
            broker.publish(&token_key, StreamItem::Token(token.to_owned()));
        };

        match self.completion.complete(&history, &on_token).await {
            Ok(full) => {
                if let Err(e) = self
                    .store
                    .append_message(&key, &ChatMessage::now(ChatRole::Assistant, full))
                    .await
                {
                    error!(session = %key, error = %e, "assistant message append failed");
                }
            }
            Err(e) => {
                error!(session = %key, error = %e, "completion failed");
                self.broker
                    .publish(&key, StreamItem::Error(e.to_string()));
            }
        }

        // Terminal item, whatever happened above.
        self.broker.publish(&key, StreamItem::Done);
    }
}
