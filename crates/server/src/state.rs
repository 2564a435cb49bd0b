//! Application state shared across handlers.

use std::sync::Arc;

use chrono::Duration;

use crate::config::ServerConfig;
use crate::services::chat::ChatService;
use crate::services::completion::{CompletionService, OllamaClient};
use crate::services::credentials::{CredentialVerifier, HmacCredentialService};
use crate::store::DocumentStore;

/// Default greeting seeded into freshly minted chat sessions.
pub const DEFAULT_GREETING: &str =
    "Hi! I'm your shopping assistant. Ask me anything about our products, \
     your cart or your orders.";

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the document store and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Arc<dyn DocumentStore>,
    chat: ChatService,
    credentials: Arc<HmacCredentialService>,
}

impl AppState {
    /// Create application state over a document store.
    #[must_use]
    pub fn new(config: ServerConfig, store: Arc<dyn DocumentStore>) -> Self {
        let completion: Arc<dyn CompletionService> = Arc::new(OllamaClient::new(
            config.ollama.base_url.clone(),
            config.ollama.model.clone(),
        ));
        Self::with_completion(config, store, completion)
    }

    /// Create application state with an explicit completion backend.
    #[must_use]
    pub fn with_completion(
        config: ServerConfig,
        store: Arc<dyn DocumentStore>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        let chat = ChatService::new(
            Arc::clone(&store),
            completion,
            crate::services::broker::StreamBroker::new(),
            Duration::days(config.anonymous_session_ttl_days),
            DEFAULT_GREETING,
        );
        let credentials = Arc::new(HmacCredentialService::new(
            config.token_secret.clone(),
            Duration::seconds(config.token_ttl_secs),
        ));
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                chat,
                credentials,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the document store.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the chat workflow.
    #[must_use]
    pub fn chat(&self) -> &ChatService {
        &self.inner.chat
    }

    /// Get the bearer token verifier.
    #[must_use]
    pub fn credentials(&self) -> &dyn CredentialVerifier {
        self.inner.credentials.as_ref()
    }

    /// Get the token issuer (verification plus issuance).
    #[must_use]
    pub fn credential_service(&self) -> &HmacCredentialService {
        &self.inner.credentials
    }
}
