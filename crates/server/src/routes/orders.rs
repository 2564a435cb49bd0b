//! Order route handlers. All routes require authentication.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use shopmate_core::OrderId;

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::Order;
use crate::services::order::OrderService;
use crate::state::AppState;

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(get_order))
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    shipping_address: String,
    payment_method: String,
}

/// Check out the caller's cart into an order.
async fn create_order(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = OrderService::new(state.store())
        .create_order(&claims.subject, body.shipping_address, body.payment_method)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderService::new(state.store())
        .list_orders(&claims.subject)
        .await?;
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.store())
        .get_order(&claims.subject, &id)
        .await?;
    Ok(Json(order))
}
