//! Product catalog loaded from a YAML file.
//!
//! ```yaml
//! - id: 7
//!   title: Canvas Tote
//!   price: "20.00"
//!   discount: "10"
//!   stock: 40
//! ```

use std::path::Path;

use tracing::info;

use cart_sync::catalog::{CachedCatalog, StaticCatalog};
use cart_sync_core::Product;

use super::CliError;

/// Parse a YAML list of products.
///
/// # Errors
///
/// Returns an error if the document is not a list of products.
pub fn parse(content: &str) -> Result<Vec<Product>, CliError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Load the catalog at `path`.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or malformed.
pub async fn load(path: &Path) -> Result<CachedCatalog<StaticCatalog>, CliError> {
    if !path.exists() {
        return Err(CliError::CatalogNotFound(path.to_path_buf()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let products = parse(&content)?;
    info!(path = %path.display(), products = products.len(), "Loaded catalog");

    Ok(CachedCatalog::new(StaticCatalog::new(products)))
}
