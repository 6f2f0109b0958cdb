//! Guest cart behavior: mutations, totals, and persistence on the device.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use rust_decimal::Decimal;

use cart_sync::CartError;
use cart_sync::storage::{FileStorage, GuestCartStorage, MemoryStorage, StorageError};
use cart_sync::store::{CartPhase, CartStore};
use cart_sync_core::{DiscountPercent, ItemKey, ProductId};
use cart_sync_integration_tests::{Harness, product};

#[tokio::test]
async fn test_guest_scenario_totals() {
    let h = Harness::new(vec![]);

    h.store.add_item(product(1, 2000), 2).await.unwrap();
    h.store.add_item(product(2, 3000), 1).await.unwrap();

    let totals = h.store.breakdown();
    assert_eq!(totals.subtotal, Decimal::from(70));
    assert_eq!(totals.tax, Decimal::from(7));
    assert_eq!(totals.shipping, Decimal::from(15));
    assert_eq!(totals.total, Decimal::from(92));
    assert_eq!(totals.total_items, 3);
    assert!(h.store.visibility().is_open());
}

#[tokio::test]
async fn test_free_shipping_at_threshold() {
    let h = Harness::new(vec![]);

    h.store.add_item(product(1, 5000), 2).await.unwrap();

    let totals = h.store.breakdown();
    assert_eq!(totals.subtotal, Decimal::ONE_HUNDRED);
    assert!(totals.shipping.is_zero());
    assert_eq!(totals.total, Decimal::from(110));
}

#[tokio::test]
async fn test_discounted_product_totals() {
    let h = Harness::new(vec![]);
    let discounted = product(1, 5000).with_discount(DiscountPercent::new(Decimal::from(20)).unwrap());

    h.store.add_item(discounted, 1).await.unwrap();

    let totals = h.store.breakdown();
    assert_eq!(totals.subtotal, Decimal::from(40));
    assert_eq!(totals.total, Decimal::from(59));
}

#[tokio::test]
async fn test_repeated_adds_keep_one_line_per_product() {
    let h = Harness::new(vec![]);

    for _ in 0..3 {
        h.store.add_item(product(1, 2000), 1).await.unwrap();
    }
    h.store.add_item(product(2, 500), 2).await.unwrap();

    let cart = h.store.cart();
    assert_eq!(cart.len(), 2);
    assert_eq!(
        cart.get(&ItemKey::Product(ProductId::new(1))).unwrap().quantity,
        3
    );
}

#[tokio::test]
async fn test_set_quantity_zero_removes_line() {
    let h = Harness::new(vec![]);
    h.store.add_item(product(1, 2000), 2).await.unwrap();

    h.store
        .set_quantity(ItemKey::Product(ProductId::new(1)), 0)
        .await
        .unwrap();

    assert_eq!(h.store.phase(), CartPhase::GuestEmpty);
    assert!(h.storage.load().is_empty());
}

#[tokio::test]
async fn test_set_quantity_unknown_line_is_not_found() {
    let h = Harness::new(vec![]);

    let err = h
        .store
        .set_quantity(ItemKey::Product(ProductId::new(5)), 2)
        .await
        .unwrap_err();

    assert!(matches!(err, CartError::NotFound(_)));
}

#[tokio::test]
async fn test_every_mutation_is_persisted() {
    let h = Harness::new(vec![]);
    let key = ItemKey::Product(ProductId::new(1));

    h.store.add_item(product(1, 2000), 1).await.unwrap();
    assert_eq!(h.storage.load(), h.store.cart());

    h.store.set_quantity(key, 4).await.unwrap();
    assert_eq!(h.storage.load(), h.store.cart());

    h.store.remove_item(key).await.unwrap();
    assert_eq!(h.storage.load(), h.store.cart());
}

#[tokio::test]
async fn test_restart_restores_cart() {
    let h = Harness::new(vec![]);
    h.store.add_item(product(1, 2000), 2).await.unwrap();

    let restarted = h.restart();

    assert_eq!(restarted.cart(), h.store.cart());
    assert_eq!(restarted.phase(), CartPhase::GuestPopulated);
}

#[tokio::test]
async fn test_malformed_record_starts_empty() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_raw("{ this is not a cart");

    let store = CartStore::builder(Arc::clone(&storage) as Arc<dyn GuestCartStorage>).build();

    assert_eq!(store.phase(), CartPhase::GuestEmpty);
    store.add_item(product(1, 2000), 1).await.unwrap();
    assert_eq!(store.cart().len(), 1);
}

#[tokio::test]
async fn test_legacy_array_record_is_loaded() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_raw(
        r#"[{"product":{"kind":"embedded","id":3,"title":"Mug","price":"12.00"},"quantity":2,"unit_price":"12.00"}]"#,
    );

    let store = CartStore::builder(Arc::clone(&storage) as Arc<dyn GuestCartStorage>).build();

    assert_eq!(store.breakdown().subtotal, Decimal::from(24));
}

#[tokio::test]
async fn test_file_storage_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("carts").join("guest.json");

    let store = CartStore::builder(Arc::new(FileStorage::new(&path))).build();
    store.add_item(product(1, 2000), 3).await.unwrap();
    drop(store);

    let store = CartStore::builder(Arc::new(FileStorage::new(&path))).build();
    assert_eq!(store.breakdown().total_items, 3);

    store.clear().unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn test_clear_empties_cart_and_record() {
    let h = Harness::new(vec![]);
    h.store.add_item(product(1, 2000), 1).await.unwrap();

    h.store.clear().unwrap();

    assert!(h.store.cart().is_empty());
    assert!(h.storage.raw().is_none());
}

/// Storage whose writes always fail.
struct ReadOnlyStorage;

impl GuestCartStorage for ReadOnlyStorage {
    fn load(&self) -> cart_sync_core::Cart {
        cart_sync_core::Cart::new()
    }

    fn save(&self, _cart: &cart_sync_core::Cart) -> Result<(), StorageError> {
        Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
    }

    fn erase(&self) -> Result<(), StorageError> {
        Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
    }
}

#[tokio::test]
async fn test_failed_save_rolls_back_mutation() {
    let store = CartStore::builder(Arc::new(ReadOnlyStorage)).build();

    let err = store.add_item(product(1, 2000), 1).await.unwrap_err();

    assert!(matches!(err, CartError::Persistence(_)));
    assert!(store.cart().is_empty());
    assert!(!store.visibility().is_open());
    assert!(store.clear().is_err());
}
