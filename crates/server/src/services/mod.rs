//! Business workflows over the document store and external backends.

pub mod broker;
pub mod cart;
pub mod chat;
pub mod completion;
pub mod credentials;
pub mod order;

pub use broker::{StreamBroker, StreamHandle, StreamItem};
pub use cart::{CartError, CartService};
pub use chat::{ChatError, ChatService};
pub use completion::{CompletionError, CompletionService, OllamaClient};
pub use credentials::{AuthError, CredentialVerifier, HmacCredentialService, TokenClaims};
pub use order::{OrderError, OrderService};
