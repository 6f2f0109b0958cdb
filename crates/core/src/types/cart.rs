//! Line items and the cart collection.
//!
//! A [`Cart`] is an ordered list of [`LineItem`]s that is unique by
//! [`ItemKey`]: the server-assigned line id when the line has been
//! persisted remotely, otherwise the id of the referenced product.
//!
//! Every line in a cart has a quantity of at least one. The mutation methods
//! take [`NonZeroU32`] so a zero-quantity line can never be produced, and
//! deserialization normalises records that violate either invariant.

use core::fmt;
use core::num::NonZeroU32;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{LineItemId, ProductId};
use super::product::Product;

// =============================================================================
// Product references
// =============================================================================

/// The product a line refers to.
///
/// Guest lines embed a full snapshot taken when the line was added.
/// Authenticated lines carry whatever the gateway resolved server-side, which
/// may be nothing at all if the product has since been deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProductRef {
    /// Full product snapshot (guest path).
    Embedded(Product),
    /// Server-side reference (authenticated path).
    Referenced {
        /// Referenced product id.
        id: ProductId,
        /// Product data resolved by the server, `None` if the reference is stale.
        #[serde(default)]
        product: Option<Product>,
    },
}

/// Outcome of resolving a [`ProductRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// The product data is available.
    Resolved(&'a Product),
    /// The referenced product no longer exists.
    Unresolved(ProductId),
}

impl ProductRef {
    /// Id of the referenced product, resolved or not.
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        match self {
            Self::Embedded(product) => product.id,
            Self::Referenced { id, .. } => *id,
        }
    }

    /// Resolve to product data.
    #[must_use]
    pub const fn resolve(&self) -> Resolution<'_> {
        match self {
            Self::Embedded(product)
            | Self::Referenced {
                product: Some(product),
                ..
            } => Resolution::Resolved(product),
            Self::Referenced { id, product: None } => Resolution::Unresolved(*id),
        }
    }
}

// =============================================================================
// Identity keys
// =============================================================================

/// Identity of a line within a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ItemKey {
    /// Server-assigned line id.
    Line(LineItemId),
    /// Product id, for lines that have no server identity.
    Product(ProductId),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(id) => write!(f, "line:{id}"),
            Self::Product(id) => write!(f, "product:{id}"),
        }
    }
}

/// Error returned when an [`ItemKey`] cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid item key '{0}' (expected line:<id>, product:<id>, or <id>)")]
pub struct ItemKeyParseError(pub String);

impl FromStr for ItemKey {
    type Err = ItemKeyParseError;

    /// Parses `line:<id>`, `product:<id>`, or a bare `<id>` (a product id).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ItemKeyParseError(s.to_owned());
        match s.trim().split_once(':') {
            Some(("line", id)) => id.parse().map(Self::Line).map_err(|_| err()),
            Some(("product", id)) => id.parse().map(Self::Product).map_err(|_| err()),
            Some(_) => Err(err()),
            None => s.parse().map(Self::Product).map_err(|_| err()),
        }
    }
}

// =============================================================================
// Line items
// =============================================================================

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Server-assigned id, absent for guest-local lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<LineItemId>,
    /// The product being purchased.
    pub product: ProductRef,
    /// Number of units, at least one for any line held by a [`Cart`].
    pub quantity: u32,
    /// Unit price captured when the line was added or last returned by the server.
    pub unit_price: Decimal,
}

impl LineItem {
    /// A guest-local line embedding `product` at its current price.
    #[must_use]
    pub fn guest(product: Product, quantity: NonZeroU32) -> Self {
        Self {
            item_id: None,
            unit_price: product.price,
            product: ProductRef::Embedded(product),
            quantity: quantity.get(),
        }
    }

    /// The line's identity key.
    #[must_use]
    pub const fn key(&self) -> ItemKey {
        match self.item_id {
            Some(id) => ItemKey::Line(id),
            None => ItemKey::Product(self.product.product_id()),
        }
    }

    #[must_use]
    pub const fn resolve(&self) -> Resolution<'_> {
        self.product.resolve()
    }
}

// =============================================================================
// Cart
// =============================================================================

/// An ordered, key-unique collection of line items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<LineItem>", into = "Vec<LineItem>")]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from raw lines, enforcing the cart invariants.
    ///
    /// Zero-quantity lines are dropped. Lines sharing a key are folded into
    /// the first occurrence, summing quantities.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = LineItem>) -> Self {
        let mut items: Vec<LineItem> = Vec::new();
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            let key = line.key();
            if let Some(existing) = items.iter_mut().find(|l| l.key() == key) {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
            } else {
                items.push(line);
            }
        }
        Self { items }
    }

    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineItem> {
        self.items.iter()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a line by identity key.
    #[must_use]
    pub fn get(&self, key: &ItemKey) -> Option<&LineItem> {
        self.items.iter().find(|line| line.key() == *key)
    }

    #[must_use]
    pub fn contains(&self, key: &ItemKey) -> bool {
        self.get(key).is_some()
    }

    /// The line holding a product, whether keyed by product or by line id.
    #[must_use]
    pub fn find_product(&self, product_id: ProductId) -> Option<&LineItem> {
        self.items
            .iter()
            .find(|line| line.product.product_id() == product_id)
    }

    /// Add `quantity` units of a product as a guest-local line.
    ///
    /// If a line for the product already exists its quantity is incremented;
    /// otherwise a new line is appended at the product's current price.
    /// Returns the resulting quantity of the line.
    pub fn add(&mut self, product: Product, quantity: NonZeroU32) -> u32 {
        let key = ItemKey::Product(product.id);
        if let Some(line) = self.items.iter_mut().find(|line| line.key() == key) {
            line.quantity = line.quantity.saturating_add(quantity.get());
            return line.quantity;
        }
        self.items.push(LineItem::guest(product, quantity));
        quantity.get()
    }

    /// Set the absolute quantity of an existing line.
    ///
    /// Returns `false` if no line has the given key.
    pub fn set_quantity(&mut self, key: &ItemKey, quantity: NonZeroU32) -> bool {
        match self.items.iter_mut().find(|line| line.key() == *key) {
            Some(line) => {
                line.quantity = quantity.get();
                true
            }
            None => false,
        }
    }

    /// Remove a line, returning it if it was present.
    pub fn remove(&mut self, key: &ItemKey) -> Option<LineItem> {
        let index = self.items.iter().position(|line| line.key() == *key)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Consume the cart, returning its lines in order.
    #[must_use]
    pub fn into_lines(self) -> Vec<LineItem> {
        self.items
    }
}

impl From<Vec<LineItem>> for Cart {
    fn from(lines: Vec<LineItem>) -> Self {
        Self::from_lines(lines)
    }
}

impl From<Cart> for Vec<LineItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

impl FromIterator<LineItem> for Cart {
    fn from_iter<I: IntoIterator<Item = LineItem>>(iter: I) -> Self {
        Self::from_lines(iter)
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a LineItem;
    type IntoIter = core::slice::Iter<'a, LineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i64, price: i64) -> Product {
        Product::new(ProductId::new(id), format!("Product {id}"), Decimal::from(price))
    }

    fn qty(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn test_add_same_product_increments() {
        let mut cart = Cart::new();
        cart.add(product(1, 20), qty(1));
        cart.add(product(1, 20), qty(2));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.items()[0].unit_price, Decimal::from(20));
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut cart = Cart::new();
        cart.add(product(2, 5), qty(1));
        cart.add(product(1, 5), qty(1));
        cart.add(product(2, 5), qty(1));
        let ids: Vec<_> = cart.iter().map(|l| l.product.product_id().as_i64()).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_set_quantity_and_remove() {
        let mut cart = Cart::new();
        cart.add(product(1, 20), qty(1));
        let key = ItemKey::Product(ProductId::new(1));

        assert!(cart.set_quantity(&key, qty(7)));
        assert_eq!(cart.get(&key).unwrap().quantity, 7);

        assert!(!cart.set_quantity(&ItemKey::Product(ProductId::new(99)), qty(1)));
        assert!(cart.remove(&key).is_some());
        assert!(cart.remove(&key).is_none());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_key_prefers_line_id() {
        let line = LineItem {
            item_id: Some(LineItemId::new(10)),
            product: ProductRef::Referenced {
                id: ProductId::new(3),
                product: None,
            },
            quantity: 1,
            unit_price: Decimal::ONE,
        };
        assert_eq!(line.key(), ItemKey::Line(LineItemId::new(10)));
        assert_eq!(line.resolve(), Resolution::Unresolved(ProductId::new(3)));

        let cart = Cart::from_lines(vec![line]);
        assert!(cart.get(&ItemKey::Product(ProductId::new(3))).is_none());
        assert_eq!(cart.find_product(ProductId::new(3)).unwrap().quantity, 1);
    }

    #[test]
    fn test_from_lines_normalises() {
        let mut zero = LineItem::guest(product(1, 10), qty(1));
        zero.quantity = 0;
        let cart = Cart::from_lines(vec![
            zero,
            LineItem::guest(product(2, 10), qty(2)),
            LineItem::guest(product(2, 10), qty(3)),
        ]);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn test_item_key_parse() {
        assert_eq!(
            "line:4".parse::<ItemKey>().unwrap(),
            ItemKey::Line(LineItemId::new(4))
        );
        assert_eq!(
            "product:8".parse::<ItemKey>().unwrap(),
            ItemKey::Product(ProductId::new(8))
        );
        assert_eq!(
            "8".parse::<ItemKey>().unwrap(),
            ItemKey::Product(ProductId::new(8))
        );
        assert!("sku:8".parse::<ItemKey>().is_err());
        assert!("line:abc".parse::<ItemKey>().is_err());
        assert_eq!(ItemKey::Line(LineItemId::new(4)).to_string(), "line:4");
    }

    #[test]
    fn test_serde_shape() {
        let mut cart = Cart::new();
        cart.add(product(1, 20), qty(2));
        let json = serde_json::to_value(&cart).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["product"]["kind"], "embedded");

        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
