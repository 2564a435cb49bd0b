//! Shopping cart entity.
//!
//! Line-level rules live here (unique lines per product, quantity
//! accumulation); stock validation and persistence are the cart
//! service's job.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopmate_core::{CartId, OwnerKey, Price, ProductId};

use super::product::Product;

/// One line in a cart. Lines are unique by product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Display price snapshot taken when the line was added.
    pub unit_price: Price,
    pub title: String,
    #[serde(default)]
    pub image_ref: Option<String>,
}

impl CartItem {
    /// Build a line from the current catalog product.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            quantity,
            unit_price: product.price.clone(),
            title: product.title.clone(),
            image_ref: product.image_ref.clone(),
        }
    }
}

/// A shopping cart owned by exactly one user or anonymous session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub owner: OwnerKey,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Create an empty cart for an owner.
    #[must_use]
    pub fn new(owner: OwnerKey) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::generate(),
            owner,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Add a line, accumulating quantity into an existing line for the
    /// same product rather than duplicating it. Accumulation saturates
    /// at `u32::MAX`; stock checks reject such quantities upstream.
    pub fn add_line(&mut self, line: CartItem) {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == line.product_id)
        {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
        } else {
            self.items.push(line);
        }
        self.touch();
    }

    /// Set the quantity of an existing line. Returns `false` when the
    /// product is not in the cart.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> bool {
        match self
            .items
            .iter_mut()
            .find(|item| &item.product_id == product_id)
        {
            Some(item) => {
                item.quantity = quantity;
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Remove a line. Returns `false` when the product is not in the cart.
    pub fn remove_line(&mut self, product_id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.product_id != product_id);
        if self.items.len() < before {
            self.touch();
            true
        } else {
            false
        }
    }

    /// Drop all lines.
    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    /// Total unit count across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Sum of line price x quantity. Lines with unparseable prices are
    /// skipped, matching the tolerant display behaviour of the catalog.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .filter_map(|item| {
                let unit = item.unit_price.amount().ok()?;
                Some(unit * Decimal::from(item.quantity))
            })
            .sum()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
