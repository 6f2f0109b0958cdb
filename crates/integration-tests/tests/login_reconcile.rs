//! Identity transitions and login reconciliation.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::sync::watch;

use cart_sync::storage::GuestCartStorage;
use cart_sync::store::{CartPhase, ReconcilePolicy};
use cart_sync::{Identity, IdentityChange};
use cart_sync_core::ProductId;
use cart_sync_integration_tests::{Harness, eventually, product};

fn fetch_count(h: &Harness) -> usize {
    h.gateway
        .calls()
        .iter()
        .filter(|call| **call == "fetch_cart")
        .count()
}

#[tokio::test]
async fn test_login_discards_guest_cart() {
    let h = Harness::new(vec![product(1, 2000), product(2, 500), product(9, 1500)]);
    h.gateway.seed(ProductId::new(9), 2);
    h.store.add_item(product(1, 2000), 3).await.unwrap();
    h.store.add_item(product(2, 500), 1).await.unwrap();

    assert!(h.store.login().await.unwrap());

    let cart = h.store.cart();
    assert_eq!(cart, h.gateway.server_cart());
    assert_eq!(cart.len(), 1);
    assert!(cart.find_product(ProductId::new(1)).is_none());
    assert!(cart.find_product(ProductId::new(2)).is_none());
    assert_eq!(h.store.phase(), CartPhase::AuthenticatedPopulated);
    assert!(h.storage.raw().is_none());
}

#[tokio::test]
async fn test_login_to_empty_server_cart() {
    let h = Harness::new(vec![product(1, 2000)]);
    h.store.add_item(product(1, 2000), 1).await.unwrap();

    h.store.login().await.unwrap();

    assert_eq!(h.store.phase(), CartPhase::AuthenticatedEmpty);
    assert!(h.store.breakdown().total.is_zero());
}

#[tokio::test]
async fn test_login_merge_policy_keeps_guest_lines() {
    let h = Harness::with_policy(
        vec![product(1, 2000), product(9, 1500)],
        ReconcilePolicy::Merge,
    );
    h.gateway.seed(ProductId::new(9), 1);
    h.store.add_item(product(1, 2000), 2).await.unwrap();

    h.store.login().await.unwrap();

    let cart = h.store.cart();
    assert_eq!(cart.len(), 2);
    assert_eq!(
        cart.find_product(ProductId::new(1)).unwrap().quantity,
        2
    );
    assert_eq!(h.gateway.calls(), vec!["add_item", "fetch_cart"]);
    assert!(h.storage.raw().is_none());
}

#[tokio::test]
async fn test_interrupted_merge_retries_only_outstanding_lines() {
    let h = Harness::with_policy(
        vec![product(1, 2000), product(2, 500)],
        ReconcilePolicy::Merge,
    );
    h.store.add_item(product(1, 2000), 2).await.unwrap();
    h.store.add_item(product(2, 500), 1).await.unwrap();
    let guest_cart = h.store.cart();

    h.gateway.pass_next();
    h.gateway.fail_next("connection reset");
    assert!(h.store.login().await.is_err());

    assert_eq!(h.store.cart(), guest_cart);
    let outstanding = h.storage.load();
    assert_eq!(outstanding.len(), 1);
    assert!(outstanding.find_product(ProductId::new(2)).is_some());

    assert!(h.store.reconcile_on_login().await.unwrap());

    let cart = h.store.cart();
    assert_eq!(cart, h.gateway.server_cart());
    assert_eq!(
        cart.find_product(ProductId::new(1)).unwrap().quantity,
        2
    );
    assert_eq!(
        cart.find_product(ProductId::new(2)).unwrap().quantity,
        1
    );
    assert_eq!(
        h.gateway.calls(),
        vec!["add_item", "add_item", "add_item", "fetch_cart"]
    );
    assert!(h.storage.raw().is_none());
}

#[tokio::test]
async fn test_reconcile_runs_once_per_login() {
    let h = Harness::new(vec![product(1, 2000)]);

    assert_eq!(
        h.store.set_identity(Identity::Authenticated),
        IdentityChange::LoggedIn
    );
    assert_eq!(
        h.store.set_identity(Identity::Authenticated),
        IdentityChange::Unchanged
    );

    assert!(h.store.reconcile_on_login().await.unwrap());
    assert!(!h.store.reconcile_on_login().await.unwrap());
    assert_eq!(fetch_count(&h), 1);
}

#[tokio::test]
async fn test_failed_reconcile_keeps_cart_and_retries() {
    let h = Harness::new(vec![product(1, 2000)]);
    h.gateway.seed(ProductId::new(1), 4);
    h.store.add_item(product(1, 2000), 1).await.unwrap();
    let guest_cart = h.store.cart();

    h.gateway.fail_next("gateway timeout");
    assert!(h.store.login().await.is_err());

    assert_eq!(h.store.cart(), guest_cart);
    assert!(h.store.last_error().is_some());
    assert_eq!(h.storage.load(), guest_cart);

    assert!(h.store.reconcile_on_login().await.unwrap());
    assert_eq!(h.store.cart(), h.gateway.server_cart());
    assert!(h.store.last_error().is_none());
}

#[tokio::test]
async fn test_identity_signal_drives_reconciliation() {
    let h = Harness::new(vec![product(1, 2000)]);
    h.gateway.seed(ProductId::new(1), 1);
    let (tx, rx) = watch::channel(Identity::Guest);
    h.store.attach_identity(rx);

    tx.send(Identity::Authenticated).unwrap();
    assert!(eventually(|| h.store.phase() == CartPhase::AuthenticatedPopulated).await);

    // Re-emitting the same identity must not reconcile again
    tx.send(Identity::Authenticated).unwrap();
    tx.send(Identity::Authenticated).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fetch_count(&h), 1);

    h.store.dispose();
}

#[tokio::test]
async fn test_logout_restores_device_cart() {
    let h = Harness::new(vec![product(1, 2000)]);
    h.gateway.seed(ProductId::new(1), 5);
    h.store.login().await.unwrap();
    assert_eq!(h.store.phase(), CartPhase::AuthenticatedPopulated);

    assert_eq!(
        h.store.set_identity(Identity::Guest),
        IdentityChange::LoggedOut
    );

    assert_eq!(h.store.phase(), CartPhase::GuestEmpty);

    h.store.add_item(product(1, 2000), 1).await.unwrap();
    assert_eq!(h.storage.load(), h.store.cart());
    assert_eq!(h.gateway.server_cart().items()[0].quantity, 5);
}

#[tokio::test]
async fn test_login_again_after_logout_reconciles_again() {
    let h = Harness::new(vec![product(1, 2000)]);

    h.store.login().await.unwrap();
    h.store.set_identity(Identity::Guest);
    h.store.login().await.unwrap();

    assert_eq!(fetch_count(&h), 2);
}
