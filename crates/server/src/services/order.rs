//! Order workflow: cart checkout with conditional stock decrements.

use thiserror::Error;
use tracing::{error, warn};

use shopmate_core::{OrderId, OwnerKey, ProductId, UserId};

use crate::models::{Order, OrderItem};
use crate::store::{DocumentStore, RepositoryError, StockDecrement};

/// Errors surfaced by the order workflow.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The user has no cart to check out.
    #[error("cart not found")]
    CartNotFound,

    /// The cart exists but has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// A cart line references a product no longer in the catalog.
    #[error("product {product_id} not found")]
    ProductNotFound { product_id: ProductId },

    /// Stock cannot cover a cart line.
    #[error("insufficient stock for {product_id}: {available} available")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
    },

    /// The requested order does not exist or belongs to someone else.
    #[error("order not found")]
    NotFound,
}

/// Checkout and order-history workflow over the document store.
pub struct OrderService<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Convert the user's cart into an order.
    ///
    /// Each line's stock is claimed through an atomic conditional
    /// decrement; a line that cannot be covered rolls back every
    /// decrement already applied and fails the checkout. Stock is also
    /// re-added if the order record itself cannot be persisted. On
    /// success the cart is deleted.
    ///
    /// # Errors
    ///
    /// [`OrderError::CartNotFound`] / [`OrderError::EmptyCart`] when
    /// there is nothing to check out,
    /// [`OrderError::InsufficientStock`] when a line loses the stock
    /// race, [`OrderError::Repository`] on store failure.
    pub async fn create_order(
        &self,
        user_id: &UserId,
        shipping_address: String,
        payment_method: String,
    ) -> Result<Order, OrderError> {
        let owner = OwnerKey::user(user_id.clone());
        let cart = self
            .store
            .find_cart_by_owner(&owner)
            .await?
            .ok_or(OrderError::CartNotFound)?;
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let mut claimed: Vec<(ProductId, u32)> = Vec::with_capacity(cart.items.len());
        let mut lines: Vec<OrderItem> = Vec::with_capacity(cart.items.len());

        for item in &cart.items {
            let product = match self.store.get_product(&item.product_id).await {
                Ok(Some(product)) => product,
                Ok(None) => {
                    self.release(&claimed).await;
                    return Err(OrderError::ProductNotFound {
                        product_id: item.product_id.clone(),
                    });
                }
                Err(e) => {
                    self.release(&claimed).await;
                    return Err(e.into());
                }
            };

            match self.store.decrement_stock(&item.product_id, item.quantity).await {
                Ok(StockDecrement::Applied) => {
                    claimed.push((item.product_id.clone(), item.quantity));
                }
                Ok(StockDecrement::Insufficient { available }) => {
                    self.release(&claimed).await;
                    return Err(OrderError::InsufficientStock {
                        product_id: item.product_id.clone(),
                        available,
                    });
                }
                Err(e) => {
                    self.release(&claimed).await;
                    return Err(e.into());
                }
            }

            lines.push(OrderItem {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                price: product.price_amount(),
                title: product.title,
                image_ref: product.image_ref,
            });
        }

        let order = Order::from_lines(user_id.clone(), lines, shipping_address, payment_method);

        if let Err(e) = self.store.insert_order(&order).await {
            error!(order_id = %order.id, error = %e, "order insert failed, releasing claimed stock");
            self.release(&claimed).await;
            return Err(e.into());
        }

        // The order is committed; a dangling cart is recoverable, so a
        // failed delete is logged rather than failing the checkout.
        if let Err(e) = self.store.delete_cart(&cart.id).await {
            warn!(cart_id = %cart.id, error = %e, "cart delete after checkout failed");
        }

        Ok(order)
    }

    async fn release(&self, claimed: &[(ProductId, u32)]) {
        for (product_id, quantity) in claimed {
            if let Err(e) = self.store.increment_stock(product_id, *quantity).await {
                error!(product_id = %product_id, quantity, error = %e,
                    "stock release failed; inventory now undercounts");
            }
        }
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Repository`] on store failure.
    pub async fn list_orders(&self, user_id: &UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders(user_id).await?)
    }

    /// One order, scoped to its owner.
    ///
    /// # Errors
    ///
    /// [`OrderError::NotFound`] when absent or owned by another user.
    pub async fn get_order(&self, user_id: &UserId, id: &OrderId) -> Result<Order, OrderError> {
        self.store
            .get_order_for_user(user_id, id)
            .await?
            .ok_or(OrderError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::Product;
    use crate::services::cart::CartService;
    use crate::store::{CartStore, MemoryStore, ProductStore};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use shopmate_core::{OrderStatus, Price};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, stock, price) in [("p-1", 10, "100"), ("p-2", 1, "250")] {
            store
                .insert_product(&Product {
                    id: ProductId::new(id),
                    title: format!("Product {id}"),
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

    async fn fill_cart(store: &MemoryStore, user: &UserId, lines: &[(&str, u32)]) {
        let carts = CartService::new(store);
        let owner = OwnerKey::user(user.clone());
        for (product, quantity) in lines {
            carts
                .add_item(&owner, &ProductId::new(*product), *quantity)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_create_order_snapshots_and_deletes_cart() {
        let store = seeded_store().await;
        let user = UserId::new("u-1");
        fill_cart(&store, &user, &[("p-1", 2), ("p-2", 1)]).await;

        let order = OrderService::new(&store)
            .create_order(&user, "12 Lane St".to_owned(), "cod".to_owned())
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.total_amount, Decimal::from(450));
        assert_eq!(order.items.len(), 2);

        // Stock decremented, cart gone
        let stock = store
            .get_product(&ProductId::new("p-1"))
            .await
            .unwrap()
            .unwrap()
            .stock_count;
        assert_eq!(stock, 8);
        assert!(store
            .find_cart_by_owner(&OwnerKey::user(user))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let store = seeded_store().await;
        let user = UserId::new("u-1");
        let service = OrderService::new(&store);

        let err = service
            .create_order(&user, "addr".to_owned(), "cod".to_owned())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::CartNotFound));

        CartService::new(&store)
            .get_or_create(&OwnerKey::user(user.clone()))
            .await
            .unwrap();
        let err = service
            .create_order(&user, "addr".to_owned(), "cod".to_owned())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::EmptyCart));
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_claims() {
        let store = seeded_store().await;
        let user = UserId::new("u-1");
        fill_cart(&store, &user, &[("p-1", 2), ("p-2", 1)]).await;

        // Someone else takes the last p-2 after the cart was filled.
        store
            .decrement_stock(&ProductId::new("p-2"), 1)
            .await
            .unwrap();

        let err = OrderService::new(&store)
            .create_order(&user, "addr".to_owned(), "cod".to_owned())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InsufficientStock { available: 0, .. }));

        // The p-1 claim was released.
        let stock = store
            .get_product(&ProductId::new("p-1"))
            .await
            .unwrap()
            .unwrap()
            .stock_count;
        assert_eq!(stock, 10);

        // And the cart survives for another attempt.
        assert!(store
            .find_cart_by_owner(&OwnerKey::user(user))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_order_insert_failure_releases_stock() {
        let store = seeded_store().await;
        let user = UserId::new("u-1");
        fill_cart(&store, &user, &[("p-1", 3)]).await;

        store.fail_next_order_insert.store(true, Ordering::SeqCst);
        let err = OrderService::new(&store)
            .create_order(&user, "addr".to_owned(), "cod".to_owned())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Repository(_)));

        let stock = store
            .get_product(&ProductId::new("p-1"))
            .await
            .unwrap()
            .unwrap()
            .stock_count;
        assert_eq!(stock, 10);
    }

    #[tokio::test]
    async fn test_concurrent_checkout_of_last_unit() {
        let store = Arc::new(seeded_store().await);
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        fill_cart(&store, &alice, &[("p-2", 1)]).await;
        fill_cart(&store, &bob, &[("p-2", 1)]).await;

        let a = {
            let store = Arc::clone(&store);
            let alice = alice.clone();
            tokio::spawn(async move {
                OrderService::new(store.as_ref())
                    .create_order(&alice, "a st".to_owned(), "cod".to_owned())
                    .await
            })
        };
        let b = {
            let store = Arc::clone(&store);
            let bob = bob.clone();
            tokio::spawn(async move {
                OrderService::new(store.as_ref())
                    .create_order(&bob, "b st".to_owned(), "cod".to_owned())
                    .await
            })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one checkout may claim the last unit");
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(OrderError::InsufficientStock { .. }))));
    }

    #[tokio::test]
    async fn test_order_visibility_scoped_to_owner() {
        let store = seeded_store().await;
        let alice = UserId::new("alice");
        fill_cart(&store, &alice, &[("p-1", 1)]).await;

        let service = OrderService::new(&store);
        let order = service
            .create_order(&alice, "addr".to_owned(), "cod".to_owned())
            .await
            .unwrap();

        assert!(service.get_order(&alice, &order.id).await.is_ok());
        let err = service
            .get_order(&UserId::new("mallory"), &order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound));
    }
}
