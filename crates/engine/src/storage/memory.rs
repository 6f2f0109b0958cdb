//! In-memory guest cart storage.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use cart_sync_core::Cart;

use super::record::{GUEST_CART_KEY, decode_record, encode_record};
use super::{GuestCartStorage, StorageError};

/// Key/value storage held in process memory.
///
/// Records are stored serialized under [`GUEST_CART_KEY`], exactly as a
/// browser-scoped store would hold them, so corrupt or legacy records can be
/// injected with [`MemoryStorage::set_raw`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored record, if any.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(GUEST_CART_KEY)
            .cloned()
    }

    /// Overwrite the raw stored record.
    pub fn set_raw(&self, raw: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(GUEST_CART_KEY.to_string(), raw.into());
    }
}

impl GuestCartStorage for MemoryStorage {
    fn load(&self) -> Cart {
        self.raw().map_or_else(Cart::new, |raw| decode_record(&raw))
    }

    fn save(&self, cart: &Cart) -> Result<(), StorageError> {
        let raw = encode_record(cart)?;
        self.set_raw(raw);
        Ok(())
    }

    fn erase(&self) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(GUEST_CART_KEY);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use core::num::NonZeroU32;

    use rust_decimal::Decimal;

    use cart_sync_core::{Product, ProductId};

    use super::*;

    #[test]
    fn test_roundtrip_and_erase() {
        let storage = MemoryStorage::new();
        assert!(storage.load().is_empty());

        let mut cart = Cart::new();
        cart.add(
            Product::new(ProductId::new(2), "Cap", Decimal::from(9)),
            NonZeroU32::new(3).unwrap(),
        );
        storage.save(&cart).unwrap();
        assert_eq!(storage.load(), cart);

        storage.erase().unwrap();
        assert!(storage.raw().is_none());
        assert!(storage.load().is_empty());
    }

    #[test]
    fn test_malformed_raw_loads_empty() {
        let storage = MemoryStorage::new();
        storage.set_raw("[{\"quantity\": \"lots\"}]");
        assert!(storage.load().is_empty());
    }
}
