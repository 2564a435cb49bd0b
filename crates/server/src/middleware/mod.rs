//! Request extractors and middleware.

pub mod identity;

pub use identity::{Identity, RequireUser, SESSION_HEADER};
