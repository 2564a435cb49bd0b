//! Cart operations: line mutation, stock-aware adds, and merge on login.

use thiserror::Error;

use shopmate_core::{OwnerKey, ProductId, SessionKey, UserId};

use crate::models::{Cart, CartItem};
use crate::store::{DocumentStore, RepositoryError};

/// Errors surfaced by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The referenced product does not exist in the catalog.
    #[error("product not found")]
    ProductNotFound,

    /// The requested quantity exceeds available stock.
    #[error("insufficient stock: {available} available")]
    OutOfStock { available: u32 },

    /// Quantity must be at least 1 for adds.
    #[error("invalid quantity")]
    InvalidQuantity,

    /// The product is not a line in this cart.
    #[error("item not in cart")]
    ItemNotFound,
}

/// Cart workflow over the document store.
pub struct CartService<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Fetch the owner's cart, creating an empty one when absent.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Repository`] on store failure.
    pub async fn get_or_create(&self, owner: &OwnerKey) -> Result<Cart, CartError> {
        if let Some(cart) = self.store.find_cart_by_owner(owner).await? {
            return Ok(cart);
        }
        let cart = Cart::new(owner.clone());
        match self.store.insert_cart(&cart).await {
            Ok(()) => Ok(cart),
            // Lost an insert race; the winner's cart is the cart.
            Err(RepositoryError::Conflict(_)) => self
                .store
                .find_cart_by_owner(owner)
                .await?
                .ok_or(CartError::Repository(RepositoryError::NotFound)),
            Err(e) => Err(e.into()),
        }
    }

    /// Add `quantity` of a product, accumulating into an existing line.
    ///
    /// The post-add line quantity is validated against current stock.
    ///
    /// # Errors
    ///
    /// [`CartError::InvalidQuantity`] for a zero quantity,
    /// [`CartError::ProductNotFound`] for an unknown product,
    /// [`CartError::OutOfStock`] when stock cannot cover the line.
    pub async fn add_item(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;

        let mut cart = self.get_or_create(owner).await?;
        let already = cart.line(product_id).map_or(0, |line| line.quantity);
        // An overflowing total can never be covered by stock.
        let wanted = already.checked_add(quantity);
        if wanted.is_none_or(|total| total > product.stock_count) {
            return Err(CartError::OutOfStock {
                available: product.stock_count,
            });
        }

        cart.add_line(CartItem::from_product(&product, quantity));
        self.store.update_cart(&cart).await?;
        Ok(cart)
    }

    /// Set the quantity of an existing line. Zero removes the line.
    ///
    /// # Errors
    ///
    /// [`CartError::ItemNotFound`] when the product is not in the cart,
    /// [`CartError::OutOfStock`] when stock cannot cover the new quantity.
    pub async fn update_item(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, CartError> {
        let mut cart = self.get_or_create(owner).await?;

        if quantity == 0 {
            if !cart.remove_line(product_id) {
                return Err(CartError::ItemNotFound);
            }
        } else {
            let product = self
                .store
                .get_product(product_id)
                .await?
                .ok_or(CartError::ProductNotFound)?;
            if quantity > product.stock_count {
                return Err(CartError::OutOfStock {
                    available: product.stock_count,
                });
            }
            if !cart.set_quantity(product_id, quantity) {
                return Err(CartError::ItemNotFound);
            }
        }

        self.store.update_cart(&cart).await?;
        Ok(cart)
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// [`CartError::ItemNotFound`] when the product is not in the cart.
    pub async fn remove_item(
        &self,
        owner: &OwnerKey,
        product_id: &ProductId,
    ) -> Result<Cart, CartError> {
        let mut cart = self.get_or_create(owner).await?;
        if !cart.remove_line(product_id) {
            return Err(CartError::ItemNotFound);
        }
        self.store.update_cart(&cart).await?;
        Ok(cart)
    }

    /// Empty the owner's cart. Succeeds with a fresh empty cart even when
    /// none existed.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Repository`] on store failure.
    pub async fn clear(&self, owner: &OwnerKey) -> Result<Cart, CartError> {
        let mut cart = self.get_or_create(owner).await?;
        if !cart.is_empty() {
            cart.clear();
            self.store.update_cart(&cart).await?;
        }
        Ok(cart)
    }

    /// Merge an anonymous session's cart into a user's cart on login.
    ///
    /// With both carts present, anonymous lines fold into the user cart
    /// (quantities accumulate per product) and the anonymous cart is
    /// deleted. With only an anonymous cart, it is re-owned in place.
    /// With no anonymous cart, the user's cart (possibly fresh) stands.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Repository`] on store failure.
    pub async fn merge(
        &self,
        user_id: &UserId,
        session_key: &SessionKey,
    ) -> Result<Cart, CartError> {
        let anon_owner = OwnerKey::anonymous(session_key.clone());
        let user_owner = OwnerKey::user(user_id.clone());

        let Some(anon_cart) = self.store.find_cart_by_owner(&anon_owner).await? else {
            return self.get_or_create(&user_owner).await;
        };

        match self.store.find_cart_by_owner(&user_owner).await? {
            Some(mut user_cart) => {
                for line in anon_cart.items.clone() {
                    user_cart.add_line(line);
                }
                self.store.update_cart(&user_cart).await?;
                self.store.delete_cart(&anon_cart.id).await?;
                Ok(user_cart)
            }
            None => {
                // Re-own in place: same cart id, new owner, single write.
                self.store.reassign_cart_owner(&anon_cart.id, &user_owner).await?;
                let mut cart = anon_cart;
                cart.owner = user_owner;
                Ok(cart)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::Product;
    use crate::store::{CartStore, MemoryStore, ProductStore};
    use chrono::Utc;
    use shopmate_core::Price;

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, stock) in [("p-1", 10), ("p-2", 1)] {
            store
                .insert_product(&Product {
                    id: ProductId::new(id),
                    title: format!("Product {id}"),
                    description: String::new(),
                    price: Price::new("100"),
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

    fn anon(s: &str) -> OwnerKey {
        OwnerKey::anonymous(SessionKey::new(s))
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = seeded_store().await;
        let service = CartService::new(&store);
        let owner = anon("s-1");

        let first = service.get_or_create(&owner).await.unwrap();
        let second = service.get_or_create(&owner).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_add_item_accumulates() {
        let store = seeded_store().await;
        let service = CartService::new(&store);
        let owner = anon("s-1");

        service
            .add_item(&owner, &ProductId::new("p-1"), 2)
            .await
            .unwrap();
        let cart = service
            .add_item(&owner, &ProductId::new("p-1"), 3)
            .await
            .unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.line(&ProductId::new("p-1")).unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn test_add_item_respects_stock() {
        let store = seeded_store().await;
        let service = CartService::new(&store);
        let owner = anon("s-1");

        service
            .add_item(&owner, &ProductId::new("p-2"), 1)
            .await
            .unwrap();
        let err = service
            .add_item(&owner, &ProductId::new("p-2"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::OutOfStock { available: 1 }));
    }

    #[tokio::test]
    async fn test_add_item_rejects_overflowing_quantity() {
        let store = seeded_store().await;
        let service = CartService::new(&store);
        let owner = anon("s-1");

        service
            .add_item(&owner, &ProductId::new("p-1"), 5)
            .await
            .unwrap();
        // A total past u32::MAX must fail the stock check, not wrap.
        let err = service
            .add_item(&owner, &ProductId::new("p-1"), u32::MAX - 3)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::OutOfStock { available: 10 }));
    }

    #[tokio::test]
    async fn test_add_unknown_product() {
        let store = seeded_store().await;
        let service = CartService::new(&store);
        let err = service
            .add_item(&anon("s-1"), &ProductId::new("ghost"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::ProductNotFound));
    }

    #[tokio::test]
    async fn test_add_zero_quantity() {
        let store = seeded_store().await;
        let service = CartService::new(&store);
        let err = service
            .add_item(&anon("s-1"), &ProductId::new("p-1"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::InvalidQuantity));
    }

    #[tokio::test]
    async fn test_update_to_zero_removes_line() {
        let store = seeded_store().await;
        let service = CartService::new(&store);
        let owner = anon("s-1");

        service
            .add_item(&owner, &ProductId::new("p-1"), 2)
            .await
            .unwrap();
        let cart = service
            .update_item(&owner, &ProductId::new("p-1"), 0)
            .await
            .unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_line() {
        let store = seeded_store().await;
        let service = CartService::new(&store);
        let err = service
            .update_item(&anon("s-1"), &ProductId::new("p-1"), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::ItemNotFound));
    }

    #[tokio::test]
    async fn test_clear_without_cart_succeeds_empty() {
        let store = seeded_store().await;
        let service = CartService::new(&store);
        let cart = service.clear(&anon("never-seen")).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_merge_folds_lines_and_deletes_anon_cart() {
        let store = seeded_store().await;
        let service = CartService::new(&store);
        let user = UserId::new("u-1");
        let session = SessionKey::new("s-1");

        service
            .add_item(&OwnerKey::user(user.clone()), &ProductId::new("p-1"), 2)
            .await
            .unwrap();
        service
            .add_item(&anon("s-1"), &ProductId::new("p-1"), 3)
            .await
            .unwrap();

        let merged = service.merge(&user, &session).await.unwrap();
        assert_eq!(merged.line(&ProductId::new("p-1")).unwrap().quantity, 5);

        let gone = store
            .find_cart_by_owner(&anon("s-1"))
            .await
            .unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_merge_reowns_in_place_without_user_cart() {
        let store = seeded_store().await;
        let service = CartService::new(&store);
        let user = UserId::new("u-1");
        let session = SessionKey::new("s-1");

        let anon_cart = service
            .add_item(&anon("s-1"), &ProductId::new("p-1"), 2)
            .await
            .unwrap();

        let merged = service.merge(&user, &session).await.unwrap();
        assert_eq!(merged.id, anon_cart.id);
        assert_eq!(merged.owner, OwnerKey::user(user));
        assert!(store.find_cart_by_owner(&anon("s-1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_without_anon_cart_yields_user_cart() {
        let store = seeded_store().await;
        let service = CartService::new(&store);
        let user = UserId::new("u-1");

        let merged = service
            .merge(&user, &SessionKey::new("no-cart"))
            .await
            .unwrap();
        assert!(merged.is_empty());
        assert_eq!(merged.owner, OwnerKey::user(user));
    }
}
