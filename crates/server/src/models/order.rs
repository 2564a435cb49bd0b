//! Immutable order records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopmate_core::{OrderId, OrderStatus, ProductId, UserId};

/// One order line. Price, title and image are snapshots taken at
/// purchase time and are immune to later product edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Unit price at purchase time.
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub title: String,
    #[serde(default)]
    pub image_ref: Option<String>,
}

impl OrderItem {
    /// The line subtotal (price x quantity).
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// An order created atomically from a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Assemble an order from snapshotted lines. Orders converted from a
    /// cart start at [`OrderStatus::Processing`].
    #[must_use]
    pub fn from_lines(
        user_id: UserId,
        items: Vec<OrderItem>,
        shipping_address: String,
        payment_method: String,
    ) -> Self {
        let now = Utc::now();
        let total_amount = items.iter().map(OrderItem::subtotal).sum();
        Self {
            id: OrderId::generate(),
            user_id,
            items,
            total_amount,
            status: OrderStatus::Processing,
            shipping_address,
            payment_method,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(product: &str, quantity: u32, price: i64) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(product),
            quantity,
            price: Decimal::from(price),
            title: format!("Product {product}"),
            image_ref: None,
        }
    }

    #[test]
    fn test_total_is_sum_of_subtotals() {
        let order = Order::from_lines(
            UserId::new("u-1"),
            vec![line("a", 2, 10), line("b", 1, 5)],
            "12 Lane St".to_owned(),
            "cod".to_owned(),
        );
        assert_eq!(order.total_amount, Decimal::from(25));
        assert_eq!(order.status, OrderStatus::Processing);
    }

    #[test]
    fn test_serde_decimal_as_string() {
        let order = Order::from_lines(
            UserId::new("u-1"),
            vec![line("a", 1, 42)],
            "addr".to_owned(),
            "card".to_owned(),
        );
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["total_amount"], "42");
        assert_eq!(json["items"][0]["price"], "42");
    }
}
