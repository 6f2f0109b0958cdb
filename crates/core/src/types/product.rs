//! Catalog product snapshot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::discount::DiscountPercent;
use super::id::ProductId;

/// A product as supplied by the catalog.
///
/// The cart never mutates products; it only embeds snapshots of them
/// (guest carts) or receives them resolved from the gateway (authenticated
/// carts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identity.
    pub id: ProductId,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Current list price.
    pub price: Decimal,
    /// Active discount, if any.
    #[serde(default)]
    pub discount: DiscountPercent,
    /// Units in stock. Read-only context, never reserved by the cart.
    #[serde(default)]
    pub stock: u32,
    /// Primary image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Product {
    /// Create a product with no discount, stock or image.
    #[must_use]
    pub fn new(id: ProductId, title: impl Into<String>, price: Decimal) -> Self {
        Self {
            id,
            title: title.into(),
            price,
            discount: DiscountPercent::NONE,
            stock: 0,
            image: None,
        }
    }

    /// Builder-style setter for the discount.
    #[must_use]
    pub fn with_discount(mut self, discount: DiscountPercent) -> Self {
        self.discount = discount;
        self
    }

    /// Builder-style setter for the stock count.
    #[must_use]
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    /// Price after applying the active discount.
    #[must_use]
    pub fn discounted_price(&self) -> Decimal {
        self.discount.apply(self.price)
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}
