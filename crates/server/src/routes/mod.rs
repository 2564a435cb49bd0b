//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Cart
//! GET    /cart                      - Get-or-create the caller's cart
//! POST   /cart/items                - Add an item
//! PUT    /cart/items/:product_id    - Set a line's quantity (0 removes)
//! DELETE /cart/items/:product_id    - Remove a line
//! DELETE /cart/items                - Clear the cart
//! POST   /cart/merge                - Fold an anonymous cart into the user's (auth)
//!
//! # Orders (require auth)
//! POST /orders                      - Check out the cart
//! GET  /orders                      - Order history, newest first
//! GET  /orders/:id                  - One order
//!
//! # Chat
//! GET  /chat/sessions               - Resolve or mint the caller's session
//! GET  /chat/sessions/:key          - Fetch a session by key
//! POST /chat/message                - Submit a message (202; response streams)
//! GET  /chat/stream?session_id=     - SSE token stream
//! ```

pub mod cart;
pub mod chat;
pub mod orders;

use axum::Router;

use crate::state::AppState;

/// Build the combined application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(cart::router())
        .merge(orders::router())
        .merge(chat::router())
}
