//! End-to-end flows over the in-memory store: browse-to-order and a
//! full chat turn with token streaming.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use shopmate_core::{ChatRole, OrderStatus, OwnerKey, Price, ProductId, SessionKey, UserId};
use shopmate_server::models::{LlmMessage, Product};
use shopmate_server::services::broker::StreamItem;
use shopmate_server::services::cart::CartService;
use shopmate_server::services::chat::ChatService;
use shopmate_server::services::completion::{CompletionError, CompletionService};
use shopmate_server::services::order::OrderService;
use shopmate_server::services::broker::StreamBroker;
use shopmate_server::store::{MemoryStore, ProductStore};

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for (id, title, price, stock) in [
        ("tee-black", "Black Tee", "19.99", 25),
        ("hoodie-gray", "Gray Hoodie", "59.00", 3),
    ] {
        store
            .insert_product(&Product {
                id: ProductId::new(id),
                title: title.to_owned(),
                description: String::new(),
                price: Price::new(price),
                image_ref: None,
                category_id: None,
                stock_count: stock,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
    }
    store
}

#[tokio::test]
async fn anonymous_browse_login_merge_checkout() {
    let store = seeded_store().await;
    let carts = CartService::new(store.as_ref());

    // Anonymous visitor fills a cart under a session key.
    let session = SessionKey::generate();
    let anon = OwnerKey::anonymous(session.clone());
    carts
        .add_item(&anon, &ProductId::new("tee-black"), 2)
        .await
        .unwrap();
    carts
        .add_item(&anon, &ProductId::new("hoodie-gray"), 1)
        .await
        .unwrap();

    // Login merges the anonymous cart into the user's.
    let user = UserId::new("u-100");
    let merged = carts.merge(&user, &session).await.unwrap();
    assert_eq!(merged.total_items(), 3);
    assert_eq!(merged.owner, OwnerKey::user(user.clone()));

    // Checkout converts the cart into an order and claims stock.
    let orders = OrderService::new(store.as_ref());
    let order = orders
        .create_order(&user, "1 Harbor Rd".to_owned(), "card".to_owned())
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.total_amount, Decimal::new(9898, 2));

    let hoodie = store
        .get_product(&ProductId::new("hoodie-gray"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hoodie.stock_count, 2);

    // The order is visible in history, and the cart is gone.
    let history = orders.list_orders(&user).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, order.id);
    let fresh = carts
        .get_or_create(&OwnerKey::user(user))
        .await
        .unwrap();
    assert!(fresh.is_empty());
}

/// Completion backend that replays a fixed token script.
struct ScriptedCompletion(Vec<&'static str>);

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(
        &self,
        _history: &[LlmMessage],
        on_token: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String, CompletionError> {
        let mut full = String::new();
        for token in &self.0 {
            on_token(token);
            full.push_str(token);
        }
        Ok(full)
    }
}

#[tokio::test]
async fn chat_turn_streams_and_persists() {
    let store = seeded_store().await;
    let chat = ChatService::new(
        store,
        Arc::new(ScriptedCompletion(vec!["The ", "tee ", "ships ", "today."])),
        StreamBroker::new(),
        chrono::Duration::days(14),
        "Welcome!",
    );

    let session = chat.resolve_or_create(None, None).await.unwrap();
    assert_eq!(session.messages[0].content, "Welcome!");

    // Consumer connects, then the message is submitted.
    let mut handle = chat.broker().open(&session.key);
    chat.submit_message(&session.key, None, "When does the tee ship?".to_owned())
        .await
        .unwrap();

    let mut streamed = String::new();
    loop {
        match handle
            .recv_timeout(Duration::from_secs(2))
            .await
            .unwrap()
            .unwrap()
        {
            StreamItem::Token(token) => streamed.push_str(&token),
            StreamItem::Done => break,
            StreamItem::Error(e) => panic!("unexpected stream error: {e}"),
        }
    }
    assert_eq!(streamed, "The tee ships today.");

    // Greeting, user turn, assistant turn.
    let refreshed = chat.get_session(&session.key, None).await.unwrap();
    assert_eq!(refreshed.messages.len(), 3);
    assert_eq!(refreshed.messages[1].role, ChatRole::User);
    assert_eq!(refreshed.messages[2].content, "The tee ships today.");
}
