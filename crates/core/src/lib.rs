//! cart-sync core - shared types library.
//!
//! This crate provides the types used across all cart-sync components:
//! - `cart-sync` - The cart store, pricing engine, persistence and gateway adapters
//! - `cli` - Command-line driver for guest and authenticated carts
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart operations - no I/O, no
//! network clients, no storage. This keeps it lightweight and allows it to be
//! used anywhere, including inside test doubles.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, discounts, products, line items and carts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
