//! Document store collaborator interfaces.
//!
//! The core consumes the store through these traits; see
//! [`memory::MemoryStore`] for the in-process backend used by tests and
//! dev mode, and [`postgres::PgStore`] for the production backend.
//!
//! Stock decrement is the one operation with a concurrency contract: it
//! must be an atomic conditional update ("decrement by N only if stock
//! >= N") so that concurrent checkouts of the last unit cannot both
//! succeed.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use shopmate_core::{CartId, OrderId, OwnerKey, ProductId, SessionKey, UserId};

use crate::models::{Cart, ChatMessage, ChatSession, Order, Product};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate owner key).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// Stock was sufficient and has been decremented.
    Applied,
    /// Stock was insufficient; nothing changed.
    Insufficient { available: u32 },
}

/// Catalog products (read + inventory mutation).
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError>;

    /// Atomically decrement stock by `quantity` iff enough remains.
    async fn decrement_stock(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, RepositoryError>;

    /// Re-add stock (order-failure compensation).
    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<(), RepositoryError>;
}

/// Carts, unique per owner key.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get_cart(&self, id: &CartId) -> Result<Option<Cart>, RepositoryError>;

    async fn find_cart_by_owner(&self, owner: &OwnerKey) -> Result<Option<Cart>, RepositoryError>;

    async fn insert_cart(&self, cart: &Cart) -> Result<(), RepositoryError>;

    async fn update_cart(&self, cart: &Cart) -> Result<(), RepositoryError>;

    async fn delete_cart(&self, id: &CartId) -> Result<(), RepositoryError>;

    /// Atomically hand a cart to a new owner, keeping its id and lines.
    ///
    /// Fails with [`RepositoryError::NotFound`] for an unknown cart and
    /// [`RepositoryError::Conflict`] when the new owner already has one.
    async fn reassign_cart_owner(
        &self,
        id: &CartId,
        owner: &OwnerKey,
    ) -> Result<(), RepositoryError>;
}

/// Immutable order records.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Orders for a user, newest first.
    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError>;

    /// An order by id, only when owned by `user_id`.
    async fn get_order_for_user(
        &self,
        user_id: &UserId,
        id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// Chat sessions with append-only message history.
#[async_trait]
pub trait ChatSessionStore: Send + Sync {
    async fn get_session_by_key(
        &self,
        key: &SessionKey,
    ) -> Result<Option<ChatSession>, RepositoryError>;

    async fn find_session_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ChatSession>, RepositoryError>;

    async fn insert_session(&self, session: &ChatSession) -> Result<(), RepositoryError>;

    /// Append one message to a session's history and bump `updated_at`.
    async fn append_message(
        &self,
        key: &SessionKey,
        message: &ChatMessage,
    ) -> Result<(), RepositoryError>;
}

/// The full document-store collaborator surface the services consume.
pub trait DocumentStore: ProductStore + CartStore + OrderStore + ChatSessionStore {}

impl<T: ProductStore + CartStore + OrderStore + ChatSessionStore> DocumentStore for T {}
