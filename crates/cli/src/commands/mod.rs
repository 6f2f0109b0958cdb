//! Command implementations.

pub mod cart;
pub mod catalog;

use std::path::PathBuf;

use thiserror::Error;

/// Errors specific to the command line tool.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Signing in requires CART_GATEWAY_URL and CART_GATEWAY_TOKEN")]
    GatewayNotConfigured,
    #[error("Catalog file not found: {}", .0.display())]
    CatalogNotFound(PathBuf),
    #[error("Failed to read catalog: {0}")]
    CatalogRead(#[from] std::io::Error),
    #[error("Invalid catalog: {0}")]
    CatalogParse(#[from] serde_yaml::Error),
}
