//! Local persistence for guest carts.
//!
//! A guest cart lives in memory and in a [`GuestCartStorage`]. The store
//! writes through on every guest mutation and erases the record when the
//! session logs in or the cart is cleared.
//!
//! # Record layout
//!
//! One JSON document under a single fixed key:
//!
//! ```json
//! { "version": 1, "saved_at": "2026-01-01T00:00:00Z", "items": [ ... ] }
//! ```
//!
//! Bare arrays of line items (records written before the version field was
//! introduced) are still accepted. Records with a newer version, or that fail
//! to parse, load as an empty cart.

mod file;
mod memory;
mod record;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use record::{GUEST_CART_KEY, RECORD_VERSION, decode_record, encode_record};

use thiserror::Error;

use cart_sync_core::Cart;

/// Errors writing or erasing the guest record.
///
/// Read failures never surface: [`GuestCartStorage::load`] recovers them
/// locally by returning an empty cart.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cart could not be serialized.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable key/value store for the guest cart.
///
/// All methods are synchronous: persistence is write-through from the
/// store's point of view.
pub trait GuestCartStorage: Send + Sync {
    /// Load the persisted cart, or an empty cart if nothing usable is stored.
    fn load(&self) -> Cart;

    /// Persist the full cart, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    fn save(&self, cart: &Cart) -> Result<(), StorageError>;

    /// Delete the persisted record. Erasing a missing record succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be removed.
    fn erase(&self) -> Result<(), StorageError>;
}
