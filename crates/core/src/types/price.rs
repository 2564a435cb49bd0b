//! Display-faithful price representation.
//!
//! Product prices arrive from the catalog as display strings and are kept
//! verbatim on the wire to avoid floating-point drift. Arithmetic uses the
//! parsed [`rust_decimal::Decimal`] accessor instead.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a price string into a decimal amount.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unparseable price: {0:?}")]
pub struct PriceError(pub String);

/// A product price as shown to customers.
///
/// Wraps the catalog's display string. Supports both plain decimal
/// notation (`"19.99"`) and dot-grouped/comma-decimal notation
/// (`"1.299.000"`, `"12,50"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(String);

impl Price {
    /// Wrap a display price string.
    #[must_use]
    pub fn new(display: impl Into<String>) -> Self {
        Self(display.into())
    }

    /// The display string, unchanged.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the display string into a decimal amount for arithmetic.
    ///
    /// Plain decimal notation is tried first; on failure the string is
    /// re-read as dot-grouped with an optional comma decimal separator.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] when neither notation parses.
    pub fn amount(&self) -> Result<Decimal, PriceError> {
        let trimmed = self.0.trim();
        if let Ok(amount) = trimmed.parse::<Decimal>() {
            return Ok(amount);
        }
        let normalized = trimmed.replace('.', "").replace(',', ".");
        normalized
            .parse::<Decimal>()
            .map_err(|_| PriceError(self.0.clone()))
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount.to_string())
    }
}

impl From<&str> for Price {
    fn from(display: &str) -> Self {
        Self(display.to_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_decimal() {
        let price = Price::new("19.99");
        assert_eq!(price.amount().unwrap(), Decimal::new(1999, 2));
    }

    #[test]
    fn test_dot_grouped() {
        let price = Price::new("1.299.000");
        assert_eq!(price.amount().unwrap(), Decimal::from(1_299_000));
    }

    #[test]
    fn test_comma_decimal() {
        let price = Price::new("12,50");
        assert_eq!(price.amount().unwrap(), Decimal::new(1250, 2));
    }

    #[test]
    fn test_unparseable() {
        let price = Price::new("call us");
        assert!(price.amount().is_err());
    }

    #[test]
    fn test_serde_transparent_string() {
        let price = Price::new("42");
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"42\"");
    }

    #[test]
    fn test_from_decimal_roundtrip() {
        let price = Price::from(Decimal::new(12345, 2));
        assert_eq!(price.as_str(), "123.45");
        assert_eq!(price.amount().unwrap(), Decimal::new(12345, 2));
    }
}
