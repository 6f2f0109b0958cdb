//! Integration tests for the cart synchronization engine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cart-sync-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `guest_cart` - Guest mutations, pricing, and device persistence
//! - `login_reconcile` - Identity transitions and reconciliation
//! - `authenticated_cart` - Server-authoritative mutations and failures
//! - `http_gateway` - The REST gateway against an in-process cart API
//!
//! Everything runs in-process; no external services are needed.

pub mod fake_api;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use cart_sync::gateway::CartGateway;
use cart_sync::notice::Notifier;
use cart_sync::storage::{GuestCartStorage, MemoryStorage};
use cart_sync::store::{CartStore, ReconcilePolicy};
use cart_sync::testing::{FakeGateway, RecordingNotifier};
use cart_sync_core::{Product, ProductId};

/// A product priced in cents.
#[must_use]
pub fn product(id: i64, cents: i64) -> Product {
    Product::new(ProductId::new(id), format!("Product {id}"), Decimal::new(cents, 2))
}

/// A store wired to in-memory storage, a fake gateway, and a recording
/// notifier.
pub struct Harness {
    pub store: CartStore,
    pub storage: Arc<MemoryStorage>,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    /// Harness whose gateway knows `products`, discarding guest lines on login.
    #[must_use]
    pub fn new(products: Vec<Product>) -> Self {
        Self::with_policy(products, ReconcilePolicy::Discard)
    }

    #[must_use]
    pub fn with_policy(products: Vec<Product>, policy: ReconcilePolicy) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let gateway = Arc::new(FakeGateway::new(products));
        let notifier = Arc::new(RecordingNotifier::new());
        let store = build_store(&storage, &gateway, &notifier, policy);
        Self {
            store,
            storage,
            gateway,
            notifier,
        }
    }

    /// A fresh store over the same storage and gateway, as after a restart.
    #[must_use]
    pub fn restart(&self) -> CartStore {
        build_store(
            &self.storage,
            &self.gateway,
            &self.notifier,
            ReconcilePolicy::Discard,
        )
    }
}

fn build_store(
    storage: &Arc<MemoryStorage>,
    gateway: &Arc<FakeGateway>,
    notifier: &Arc<RecordingNotifier>,
    policy: ReconcilePolicy,
) -> CartStore {
    CartStore::builder(Arc::clone(storage) as Arc<dyn GuestCartStorage>)
        .gateway(Arc::clone(gateway) as Arc<dyn CartGateway>)
        .notifier(Arc::clone(notifier) as Arc<dyn Notifier>)
        .reconcile_policy(policy)
        .build()
}

/// Poll `condition` until it holds, giving up after two seconds.
///
/// Returns whether the condition was met.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
