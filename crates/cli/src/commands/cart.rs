//! Cart commands.

use std::sync::Arc;

use tracing::info;

use cart_sync::config::EngineConfig;
use cart_sync::gateway::{CartGateway, HttpCartGateway};
use cart_sync::pricing::effective_unit_price;
use cart_sync::storage::FileStorage;
use cart_sync::store::CartStore;
use cart_sync_core::{Price, Resolution};

use super::CliError;

/// Build a store over the guest cart file and, if configured, the cart API.
pub fn open_store(config: &EngineConfig) -> CartStore {
    let mut builder =
        CartStore::builder(Arc::new(FileStorage::new(config.storage_path.clone()))).config(config);
    if let Some(gateway) = &config.gateway {
        builder = builder.gateway(Arc::new(HttpCartGateway::new(gateway)) as Arc<dyn CartGateway>);
    }
    builder.build()
}

/// Authenticate the session and reconcile with the server cart.
///
/// # Errors
///
/// Returns an error if no gateway is configured or reconciliation fails.
pub async fn sign_in(store: &CartStore) -> Result<(), Box<dyn std::error::Error>> {
    if !store.has_gateway() {
        return Err(CliError::GatewayNotConfigured.into());
    }
    store.login().await?;
    Ok(())
}

/// Print cart lines and totals.
pub fn show(store: &CartStore) {
    let snapshot = store.snapshot();
    let totals = store.breakdown();
    let currency = totals.currency;

    info!("Cart: {}", snapshot.phase());
    if snapshot.cart.is_empty() {
        info!("  (empty)");
    }
    for line in &snapshot.cart {
        let title = match line.resolve() {
            Resolution::Resolved(product) => product.title.as_str(),
            Resolution::Unresolved(_) => "(no longer available)",
        };
        let unit = effective_unit_price(line)
            .map_or_else(|| "-".to_string(), |p| Price::new(p, currency).display());
        info!(
            "  {:<14} {:<32} x{:<4} {}",
            line.key().to_string(),
            title,
            line.quantity,
            unit
        );
    }

    info!("Items:    {}", totals.total_items);
    info!("Subtotal: {}", totals.subtotal_price());
    info!("Tax:      {}", totals.tax_price());
    if totals.has_free_shipping() {
        info!("Shipping: free");
    } else {
        info!("Shipping: {}", totals.shipping_price());
    }
    info!("Total:    {}", totals.total_price());
}
