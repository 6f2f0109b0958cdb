//! cart-sync - cart and pricing synchronization engine.
//!
//! Maintains a storefront client's line-item collection across guest and
//! authenticated sessions, reconciles the local copy against the server-held
//! cart, and derives monetary totals from it.
//!
//! # Architecture
//!
//! - [`store::CartStore`] is the single authority for cart state. Guest
//!   mutations apply in memory and write through to [`storage`];
//!   authenticated mutations go through a [`gateway::CartGateway`] and
//!   replace the in-memory cart with the server's response.
//! - [`pricing`] derives subtotal, tax, shipping and total on every read.
//! - [`visibility`] tracks whether the cart panel is open.
//! - [`identity`] forwards guest/authenticated transitions to the store and
//!   runs reconciliation on login.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use cart_sync::gateway::HttpCartGateway;
//! use cart_sync::storage::FileStorage;
//! use cart_sync::store::CartStore;
//!
//! let store = CartStore::builder(Arc::new(FileStorage::new("guest_cart.json")))
//!     .gateway(Arc::new(HttpCartGateway::new(&gateway_config)))
//!     .build();
//! store.attach_identity(session.identity());
//!
//! store.add_item(product, 1).await?;
//! let totals = store.breakdown();
//! println!("{}", totals.total_price());
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod notice;
pub mod pricing;
pub mod storage;
pub mod store;
pub mod visibility;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{CartError, Result};
pub use identity::{Identity, IdentityChange};
pub use pricing::{PricingBreakdown, PricingPolicy, compute_breakdown};
pub use store::{CartPhase, CartSnapshot, CartStore, ReconcilePolicy};
