//! Percentage discount type.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`DiscountPercent`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscountError {
    /// The percentage is below zero.
    #[error("discount cannot be negative (got {0})")]
    Negative(Decimal),
    /// The percentage is above one hundred.
    #[error("discount must be at most 100 (got {0})")]
    AboveHundred(Decimal),
}

/// A discount expressed as a percentage between 0 and 100 inclusive.
///
/// ## Examples
///
/// ```
/// use cart_sync_core::DiscountPercent;
/// use rust_decimal::Decimal;
///
/// let twenty = DiscountPercent::new(Decimal::from(20)).unwrap();
/// assert_eq!(twenty.apply(Decimal::from(50)), Decimal::from(40));
///
/// assert!(DiscountPercent::new(Decimal::from(101)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct DiscountPercent(Decimal);

impl DiscountPercent {
    /// No discount.
    pub const NONE: Self = Self(Decimal::ZERO);

    /// Create a discount, validating the 0-100 range.
    ///
    /// # Errors
    ///
    /// Returns an error if the percentage is negative or greater than 100.
    pub fn new(percent: Decimal) -> Result<Self, DiscountError> {
        if percent.is_sign_negative() && !percent.is_zero() {
            return Err(DiscountError::Negative(percent));
        }
        if percent > Decimal::ONE_HUNDRED {
            return Err(DiscountError::AboveHundred(percent));
        }
        Ok(Self(percent))
    }

    /// The raw percentage value.
    #[must_use]
    pub const fn percent(&self) -> Decimal {
        self.0
    }

    /// Whether the discount changes the price at all.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Apply the discount to a base price: `base × (1 − percent/100)`.
    ///
    /// An inactive discount returns `base` unmodified.
    #[must_use]
    pub fn apply(&self, base: Decimal) -> Decimal {
        if !self.is_active() {
            return base;
        }
        base * (Decimal::ONE - self.0 / Decimal::ONE_HUNDRED)
    }
}

impl TryFrom<Decimal> for DiscountPercent {
    type Error = DiscountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DiscountPercent> for Decimal {
    fn from(value: DiscountPercent) -> Self {
        value.0
    }
}

impl fmt::Display for DiscountPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}
