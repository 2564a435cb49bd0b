//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::cart::CartError;
use crate::services::chat::ChatError;
use crate::services::credentials::AuthError;
use crate::services::order::OrderError;
use crate::store::RepositoryError;

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Document store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] RepositoryError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Chat operation failed.
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Store(_)
                | Self::Internal(_)
                | Self::Cart(CartError::Repository(_))
                | Self::Order(OrderError::Repository(_))
                | Self::Chat(ChatError::Repository(_))
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cart(err) => match err {
                CartError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
                CartError::ProductNotFound | CartError::ItemNotFound => StatusCode::NOT_FOUND,
                CartError::OutOfStock { .. } | CartError::InvalidQuantity => {
                    StatusCode::BAD_REQUEST
                }
            },
            Self::Order(err) => match err {
                OrderError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
                OrderError::NotFound | OrderError::CartNotFound => StatusCode::NOT_FOUND,
                OrderError::EmptyCart
                | OrderError::ProductNotFound { .. }
                | OrderError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            },
            Self::Chat(err) => match err {
                ChatError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ChatError::SessionNotFound => StatusCode::NOT_FOUND,
            },
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        if self.is_server_error() {
            // Don't expose internal error details to clients
            return "Internal server error".to_string();
        }
        match self {
            Self::Cart(err) => err.to_string(),
            Self::Order(err) => err.to_string(),
            Self::Chat(err) => err.to_string(),
            Self::Auth(err) => err.to_string(),
            Self::NotFound(msg) | Self::BadRequest(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
