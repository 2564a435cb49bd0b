//! Domain entities persisted through the document store.

pub mod cart;
pub mod chat;
pub mod order;
pub mod product;

pub use cart::{Cart, CartItem};
pub use chat::{ChatMessage, ChatSession, LlmMessage};
pub use order::{Order, OrderItem};
pub use product::Product;
