//! In-process document store backend.
//!
//! Backs tests and the zero-dependency dev mode. Each collection is one
//! mutexed map; `decrement_stock` performs its check-and-subtract under
//! the products lock, which gives it the same atomic conditional
//! semantics as the SQL backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use shopmate_core::{CartId, OrderId, OwnerKey, ProductId, SessionKey, UserId};

use crate::models::{Cart, ChatMessage, ChatSession, Order, Product};

use super::{
    CartStore, ChatSessionStore, OrderStore, ProductStore, RepositoryError, StockDecrement,
};

/// In-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    products: Mutex<HashMap<ProductId, Product>>,
    carts: Mutex<HashMap<CartId, Cart>>,
    orders: Mutex<HashMap<OrderId, Order>>,
    sessions: Mutex<HashMap<SessionKey, ChatSession>>,
    /// Test knob: make the next `insert_order` fail, exercising the
    /// order workflow's stock compensation path.
    pub fail_next_order_insert: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.lock().await.get(id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        self.products
            .lock()
            .await
            .insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn decrement_stock(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, RepositoryError> {
        let mut products = self.products.lock().await;
        let product = products.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if product.stock_count < quantity {
            return Ok(StockDecrement::Insufficient {
                available: product.stock_count,
            });
        }
        product.stock_count -= quantity;
        product.updated_at = chrono::Utc::now();
        Ok(StockDecrement::Applied)
    }

    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<(), RepositoryError> {
        let mut products = self.products.lock().await;
        let product = products.get_mut(id).ok_or(RepositoryError::NotFound)?;
        product.stock_count += quantity;
        product.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn get_cart(&self, id: &CartId) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.carts.lock().await.get(id).cloned())
    }

    async fn find_cart_by_owner(&self, owner: &OwnerKey) -> Result<Option<Cart>, RepositoryError> {
        Ok(self
            .carts
            .lock()
            .await
            .values()
            .find(|cart| &cart.owner == owner)
            .cloned())
    }

    async fn insert_cart(&self, cart: &Cart) -> Result<(), RepositoryError> {
        let mut carts = self.carts.lock().await;
        if carts.values().any(|existing| existing.owner == cart.owner) {
            return Err(RepositoryError::Conflict(format!(
                "cart already exists for owner {}",
                cart.owner
            )));
        }
        carts.insert(cart.id.clone(), cart.clone());
        Ok(())
    }

    async fn update_cart(&self, cart: &Cart) -> Result<(), RepositoryError> {
        let mut carts = self.carts.lock().await;
        if !carts.contains_key(&cart.id) {
            return Err(RepositoryError::NotFound);
        }
        carts.insert(cart.id.clone(), cart.clone());
        Ok(())
    }

    async fn delete_cart(&self, id: &CartId) -> Result<(), RepositoryError> {
        self.carts.lock().await.remove(id);
        Ok(())
    }

    async fn reassign_cart_owner(
        &self,
        id: &CartId,
        owner: &OwnerKey,
    ) -> Result<(), RepositoryError> {
        let mut carts = self.carts.lock().await;
        if carts
            .values()
            .any(|existing| &existing.owner == owner && &existing.id != id)
        {
            return Err(RepositoryError::Conflict(format!(
                "cart already exists for owner {owner}"
            )));
        }
        let cart = carts.get_mut(id).ok_or(RepositoryError::NotFound)?;
        cart.owner = owner.clone();
        cart.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        if self.fail_next_order_insert.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::DataCorruption(
                "simulated order insert failure".to_owned(),
            ));
        }
        self.orders
            .lock()
            .await
            .insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .await
            .values()
            .filter(|order| &order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn get_order_for_user(
        &self,
        user_id: &UserId,
        id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .orders
            .lock()
            .await
            .get(id)
            .filter(|order| &order.user_id == user_id)
            .cloned())
    }
}

#[async_trait]
impl ChatSessionStore for MemoryStore {
    async fn get_session_by_key(
        &self,
        key: &SessionKey,
    ) -> Result<Option<ChatSession>, RepositoryError> {
        Ok(self.sessions.lock().await.get(key).cloned())
    }

    async fn find_session_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ChatSession>, RepositoryError> {
        Ok(self
            .sessions
            .lock()
            .await
            .values()
            .find(|session| session.owner.user_id() == Some(user_id))
            .cloned())
    }

    async fn insert_session(&self, session: &ChatSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session.key) {
            return Err(RepositoryError::Conflict(format!(
                "session key {} already exists",
                session.key
            )));
        }
        sessions.insert(session.key.clone(), session.clone());
        Ok(())
    }

    async fn append_message(
        &self,
        key: &SessionKey,
        message: &ChatMessage,
    ) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(key).ok_or(RepositoryError::NotFound)?;
        session.push_message(message.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shopmate_core::Price;

    fn product(id: &str, stock: u32) -> Product {
        Product {
            id: ProductId::new(id),
            title: format!("Product {id}"),
            description: String::new(),
            price: Price::new("10"),
            image_ref: None,
            category_id: None,
            stock_count: stock,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_decrement_stock_conditional() {
        let store = MemoryStore::new();
        store.insert_product(&product("p", 5)).await.unwrap();

        let outcome = store
            .decrement_stock(&ProductId::new("p"), 3)
            .await
            .unwrap();
        assert_eq!(outcome, StockDecrement::Applied);

        let outcome = store
            .decrement_stock(&ProductId::new("p"), 3)
            .await
            .unwrap();
        assert_eq!(outcome, StockDecrement::Insufficient { available: 2 });

        // Insufficient decrement must not have changed anything
        let remaining = store
            .get_product(&ProductId::new("p"))
            .await
            .unwrap()
            .unwrap()
            .stock_count;
        assert_eq!(remaining, 2);
    }

    #[tokio::test]
    async fn test_decrement_unknown_product() {
        let store = MemoryStore::new();
        let err = store
            .decrement_stock(&ProductId::new("ghost"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_concurrent_last_unit_decrement() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.insert_product(&product("p", 1)).await.unwrap();

        let a = {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move { store.decrement_stock(&ProductId::new("p"), 1).await })
        };
        let b = {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move { store.decrement_stock(&ProductId::new("p"), 1).await })
        };

        let outcomes = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        let applied = outcomes
            .iter()
            .filter(|o| matches!(o, StockDecrement::Applied))
            .count();
        assert_eq!(applied, 1, "exactly one checkout may win the last unit");
    }

    #[tokio::test]
    async fn test_one_cart_per_owner() {
        let store = MemoryStore::new();
        let owner = OwnerKey::anonymous(SessionKey::new("s-1"));
        store.insert_cart(&Cart::new(owner.clone())).await.unwrap();

        let err = store.insert_cart(&Cart::new(owner)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_reassign_cart_owner_in_place() {
        let store = MemoryStore::new();
        let anon = OwnerKey::anonymous(SessionKey::new("s-1"));
        let cart = Cart::new(anon.clone());
        store.insert_cart(&cart).await.unwrap();

        let user = OwnerKey::user(UserId::new("u-1"));
        store.reassign_cart_owner(&cart.id, &user).await.unwrap();

        assert!(store.find_cart_by_owner(&anon).await.unwrap().is_none());
        let reowned = store.find_cart_by_owner(&user).await.unwrap().unwrap();
        assert_eq!(reowned.id, cart.id);
    }

    #[tokio::test]
    async fn test_reassign_cart_owner_conflicts_and_missing() {
        let store = MemoryStore::new();
        let user = OwnerKey::user(UserId::new("u-1"));
        store.insert_cart(&Cart::new(user.clone())).await.unwrap();

        let anon_cart = Cart::new(OwnerKey::anonymous(SessionKey::new("s-1")));
        store.insert_cart(&anon_cart).await.unwrap();

        let err = store
            .reassign_cart_owner(&anon_cart.id, &user)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let err = store
            .reassign_cart_owner(&CartId::new("ghost"), &user)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_orders_listed_newest_first() {
        let store = MemoryStore::new();
        let user = UserId::new("u-1");
        for _ in 0..3 {
            let order = Order::from_lines(
                user.clone(),
                vec![crate::models::OrderItem {
                    product_id: ProductId::new("p"),
                    quantity: 1,
                    price: rust_decimal::Decimal::ONE,
                    title: "x".to_owned(),
                    image_ref: None,
                }],
                "addr".to_owned(),
                "cod".to_owned(),
            );
            store.insert_order(&order).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let orders = store.list_orders(&user).await.unwrap();
        assert_eq!(orders.len(), 3);
        assert!(orders[0].created_at >= orders[1].created_at);
        assert!(orders[1].created_at >= orders[2].created_at);
    }
}
