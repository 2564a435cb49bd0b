//! Core types for Shopmate.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod owner;
pub mod price;
pub mod role;
pub mod status;

pub use id::*;
pub use owner::OwnerKey;
pub use price::{Price, PriceError};
pub use role::ChatRole;
pub use status::OrderStatus;
