//! The REST gateway against an in-process cart API.

#![allow(clippy::unwrap_used)]

use std::num::NonZeroU32;
use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::SecretString;

use cart_sync::config::GatewayConfig;
use cart_sync::gateway::{CartGateway, GatewayError, HttpCartGateway};
use cart_sync::storage::MemoryStorage;
use cart_sync::store::{CartPhase, CartStore};
use cart_sync::testing::FakeGateway;
use cart_sync_core::{DiscountPercent, ItemKey, ProductId, Resolution};
use cart_sync_integration_tests::fake_api::{FakeCartApi, TOKEN};
use cart_sync_integration_tests::product;

fn client(api: &FakeCartApi, token: &str) -> HttpCartGateway {
    HttpCartGateway::new(&GatewayConfig {
        base_url: api.base_url.parse().unwrap(),
        token: SecretString::from(token.to_string()),
    })
}

async fn serve(products: Vec<cart_sync_core::Product>) -> (Arc<FakeGateway>, FakeCartApi) {
    let backend = Arc::new(FakeGateway::new(products));
    let api = FakeCartApi::spawn(Arc::clone(&backend)).await.unwrap();
    (backend, api)
}

#[tokio::test]
async fn test_fetch_cart_decodes_lines() {
    let tee = product(1, 2000).with_discount(DiscountPercent::new(Decimal::from(25)).unwrap());
    let (backend, api) = serve(vec![tee]).await;
    let line_id = backend.seed(ProductId::new(1), 2);

    let cart = client(&api, TOKEN).fetch_cart().await.unwrap();

    let line = cart.get(&ItemKey::Line(line_id)).unwrap();
    assert_eq!(line.quantity, 2);
    assert_eq!(line.unit_price, Decimal::from(20));
    match line.resolve() {
        Resolution::Resolved(p) => assert_eq!(p.discounted_price(), Decimal::from(15)),
        Resolution::Unresolved(_) => panic!("product should resolve"),
    }
}

#[tokio::test]
async fn test_deleted_product_decodes_as_unresolved() {
    let (backend, api) = serve(vec![product(1, 2000)]).await;
    backend.seed(ProductId::new(1), 1);
    backend.delete_product(ProductId::new(1));

    let cart = client(&api, TOKEN).fetch_cart().await.unwrap();

    assert!(matches!(cart.items()[0].resolve(), Resolution::Unresolved(_)));
}

#[tokio::test]
async fn test_mutations_round_trip() {
    let (backend, api) = serve(vec![product(1, 2000), product(2, 500)]).await;
    let gateway = client(&api, TOKEN);

    gateway
        .add_item(ProductId::new(1), NonZeroU32::new(2).unwrap())
        .await
        .unwrap();
    let cart = gateway
        .add_item(ProductId::new(2), NonZeroU32::MIN)
        .await
        .unwrap();
    let pin = cart
        .find_product(ProductId::new(2))
        .and_then(|l| l.item_id)
        .unwrap();

    let cart = gateway
        .set_quantity(pin, NonZeroU32::new(6).unwrap())
        .await
        .unwrap();
    assert_eq!(cart.get(&ItemKey::Line(pin)).unwrap().quantity, 6);

    let cart = gateway.remove_item(pin).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart, backend.server_cart());
}

#[tokio::test]
async fn test_client_error_becomes_rejection() {
    let (_backend, api) = serve(vec![product(1, 2000)]).await;

    let err = client(&api, TOKEN)
        .add_item(ProductId::new(99), NonZeroU32::MIN)
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Rejected(msg) if msg == "Product not available"));
}

#[tokio::test]
async fn test_bad_token_is_rejected() {
    let (_backend, api) = serve(vec![]).await;

    let err = client(&api, "expired").fetch_cart().await.unwrap_err();

    assert!(matches!(err, GatewayError::Rejected(msg) if msg == "Please sign in again."));
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let (backend, api) = serve(vec![]).await;
    backend.fail_next("database down");

    let err = client(&api, TOKEN).fetch_cart().await.unwrap_err();

    assert!(matches!(err, GatewayError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_store_over_http() {
    let (backend, api) = serve(vec![product(1, 2000), product(2, 3000)]).await;
    backend.seed(ProductId::new(2), 1);
    let store = CartStore::builder(Arc::new(MemoryStorage::new()))
        .gateway(Arc::new(client(&api, TOKEN)))
        .build();
    store.add_item(product(1, 2000), 1).await.unwrap();

    store.login().await.unwrap();
    assert_eq!(store.breakdown().subtotal, Decimal::from(30));

    store.add_item(product(1, 2000), 2).await.unwrap();
    let totals = store.breakdown();
    assert_eq!(totals.subtotal, Decimal::from(70));
    assert_eq!(totals.total, Decimal::from(92));
    assert_eq!(store.phase(), CartPhase::AuthenticatedPopulated);
    assert_eq!(store.cart(), backend.server_cart());
}
