//! Catalog product as read by the cart and order flows.
//!
//! Product CRUD itself lives outside the core; this is the read model the
//! Cart Ledger validates against and the Order Workflow snapshots from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopmate_core::{CategoryId, Price, ProductId};

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Display price; use [`Product::price_amount`] for arithmetic.
    pub price: Price,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub stock_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Parsed decimal amount of the display price.
    ///
    /// Unparseable catalog prices are treated as zero, matching the
    /// tolerant behaviour of the import pipeline; a warning is logged.
    #[must_use]
    pub fn price_amount(&self) -> Decimal {
        self.price.amount().unwrap_or_else(|e| {
            tracing::warn!(product_id = %self.id, error = %e, "unparseable product price");
            Decimal::ZERO
        })
    }

    /// Whether any stock remains.
    #[must_use]
    pub const fn is_in_stock(&self) -> bool {
        self.stock_count > 0
    }
}
