//! Order lifecycle status.

use serde::{Deserialize, Serialize};

/// Order fulfillment lifecycle.
///
/// Orders created from a cart start at [`OrderStatus::Processing`];
/// `PendingPayment` exists for flows that defer payment capture.
/// `Delivered`, `Cancelled` and `Refunded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    PendingPayment,
    Processing,
    Shipping,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Whether this status admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }

    /// Whether a transition to `next` is allowed.
    ///
    /// Forward progress only: `PendingPayment -> Processing -> Shipping ->
    /// Delivered`, with `Cancelled` reachable from any non-terminal state
    /// and `Refunded` reachable from `Delivered` or `Cancelled`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::PendingPayment, Self::Processing)
            | (Self::Processing, Self::Shipping)
            | (Self::Shipping, Self::Delivered)
            | (Self::Delivered | Self::Cancelled, Self::Refunded) => true,
            (current, Self::Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }

    /// Stable machine-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Processing => "processing",
            Self::Shipping => "shipping",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Parse a stable status name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(Self::PendingPayment),
            "processing" => Some(Self::Processing),
            "shipping" => Some(Self::Shipping),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
