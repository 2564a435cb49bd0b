//! Cart route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use shopmate_core::{ProductId, SessionKey};

use crate::error::Result;
use crate::middleware::{Identity, RequireUser};
use crate::models::{Cart, CartItem};
use crate::services::cart::CartService;
use crate::state::AppState;

/// Build the cart router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart))
        .route("/cart/items", post(add_item).delete(clear_cart))
        .route(
            "/cart/items/{product_id}",
            put(update_item).delete(remove_item),
        )
        .route("/cart/merge", post(merge_cart))
}

/// Wire shape for a cart.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: String,
    pub items: Vec<CartItem>,
    pub total_items: u32,
    /// Decimal total rendered as a string.
    pub total: String,
    pub is_anonymous: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        Self {
            id: cart.id.as_str().to_owned(),
            total_items: cart.total_items(),
            total: cart.total().to_string(),
            is_anonymous: cart.owner.is_anonymous(),
            updated_at: cart.updated_at,
            items: cart.items,
        }
    }
}

/// Response envelope echoing the session key anonymous clients must keep.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart: CartView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionKey>,
}

fn respond(identity: &Identity, cart: Cart) -> Json<CartResponse> {
    let session_id = match cart.owner.session_key() {
        Some(key) => Some(key.clone()),
        None => identity.session.clone(),
    };
    Json(CartResponse {
        cart: cart.into(),
        session_id,
    })
}

async fn get_cart(State(state): State<AppState>, identity: Identity) -> Result<Json<CartResponse>> {
    let owner = identity.owner()?;
    let cart = CartService::new(state.store()).get_or_create(&owner).await?;
    Ok(respond(&identity, cart))
}

#[derive(Debug, Deserialize)]
struct AddItemRequest {
    product_id: ProductId,
    quantity: u32,
}

async fn add_item(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartResponse>> {
    let owner = identity.owner()?;
    let cart = CartService::new(state.store())
        .add_item(&owner, &body.product_id, body.quantity)
        .await?;
    Ok(respond(&identity, cart))
}

#[derive(Debug, Deserialize)]
struct UpdateItemRequest {
    quantity: u32,
}

async fn update_item(
    State(state): State<AppState>,
    identity: Identity,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<CartResponse>> {
    let owner = identity.owner()?;
    let cart = CartService::new(state.store())
        .update_item(&owner, &product_id, body.quantity)
        .await?;
    Ok(respond(&identity, cart))
}

async fn remove_item(
    State(state): State<AppState>,
    identity: Identity,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartResponse>> {
    let owner = identity.owner()?;
    let cart = CartService::new(state.store())
        .remove_item(&owner, &product_id)
        .await?;
    Ok(respond(&identity, cart))
}

async fn clear_cart(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<CartResponse>> {
    let owner = identity.owner()?;
    let cart = CartService::new(state.store()).clear(&owner).await?;
    Ok(respond(&identity, cart))
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    session_id: SessionKey,
}

/// Fold an anonymous cart into the authenticated user's cart on login.
async fn merge_cart(
    State(state): State<AppState>,
    RequireUser(claims): RequireUser,
    Json(body): Json<MergeRequest>,
) -> Result<Json<CartResponse>> {
    let cart = CartService::new(state.store())
        .merge(&claims.subject, &body.session_id)
        .await?;
    Ok(Json(CartResponse {
        cart: cart.into(),
        session_id: None,
    }))
}
