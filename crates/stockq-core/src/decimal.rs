//! Precision-safe price type.
//!
//! Prices read from a source are kept as `rust_decimal::Decimal` so that
//! `100.10` stays `100.10` all the way to the output.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Price with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Exporters occasionally emit exponent notation ("1.5E+2").
        match Decimal::from_str(s) {
            Ok(d) => Ok(Self(d)),
            Err(e) => Decimal::from_scientific(s).map(Self).map_err(|_| e),
        }
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_keeps_scale() {
        let price: Price = "100.10".parse().unwrap();
        assert_eq!(price.inner(), dec!(100.10));
        assert_eq!(price.to_string(), "100.10");
    }

    #[test]
    fn test_price_scientific_notation() {
        let price: Price = "1.5e2".parse().unwrap();
        assert_eq!(price.inner(), dec!(150));
    }

    #[test]
    fn test_price_rejects_garbage() {
        assert!("abc".parse::<Price>().is_err());
        assert!("".parse::<Price>().is_err());
    }
}
