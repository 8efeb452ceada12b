//! Type-safe money amounts using decimal arithmetic.
//!
//! The upstream API sends monetary totals as decimal strings (`"19.99"`).
//! Amounts are parsed into [`Decimal`] and always rendered with two
//! fractional digits, so a missing total becomes `"0.00"`.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when an upstream amount is not a decimal number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid money amount: {0:?}")]
pub struct MoneyError(pub String);

/// A monetary amount in the order's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// The zero amount, rendered as `0.00`.
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, 2));

    /// Create an amount rounded to two fractional digits.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        let mut amount = amount.round_dp(2);
        amount.rescale(2);
        Self(amount)
    }

    /// Parse an optional upstream amount, defaulting to zero when absent.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError` if the value is present but not a decimal number.
    pub fn parse_or_zero(value: Option<&str>) -> Result<Self, MoneyError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::ZERO),
            Some(raw) => raw.parse(),
        }
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Self::new)
            .map_err(|_| MoneyError(s.to_string()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
