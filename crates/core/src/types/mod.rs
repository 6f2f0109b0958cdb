//! Core types for cart-sync.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod discount;
pub mod id;
pub mod price;
pub mod product;

pub use cart::{Cart, ItemKey, ItemKeyParseError, LineItem, ProductRef, Resolution};
pub use discount::{DiscountError, DiscountPercent};
pub use id::*;
pub use price::{CurrencyCode, Price, UnknownCurrency};
pub use product::Product;
