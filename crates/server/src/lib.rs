//! Shopmate backend: cart, checkout, and a streaming shopping assistant.
//!
//! The binary in `main.rs` wires configuration, the document store, and
//! the HTTP router; everything else lives here so integration tests can
//! drive the services and router directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

pub use error::{AppError, Result};
pub use state::AppState;
