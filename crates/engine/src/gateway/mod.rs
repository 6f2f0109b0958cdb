//! Remote cart gateway.
//!
//! The server holds the authoritative cart for authenticated sessions. Every
//! gateway call returns the *full* resulting cart, never a delta, and the
//! store always replaces its in-memory copy with that response.
//!
//! # Implementations
//!
//! - [`HttpCartGateway`] - JSON REST client over `reqwest`
//! - [`crate::testing::FakeGateway`] - in-process double (`test-util` feature)

mod conversions;
mod http;

pub use http::HttpCartGateway;

use core::num::NonZeroU32;

use async_trait::async_trait;
use thiserror::Error;

use cart_sync_core::{Cart, LineItemId, ProductId};

/// Errors that can occur when talking to the cart gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-success status without a readable message.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by the server.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The server rejected the operation with a message meant for the user.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// No gateway is reachable or configured.
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// Server-side cart operations.
#[async_trait]
pub trait CartGateway: Send + Sync {
    /// Fetch the authoritative cart.
    async fn fetch_cart(&self) -> Result<Cart, GatewayError>;

    /// Add units of a product, returning the full cart.
    async fn add_item(
        &self,
        product_id: ProductId,
        quantity: NonZeroU32,
    ) -> Result<Cart, GatewayError>;

    /// Set the absolute quantity of a line, returning the full cart.
    async fn set_quantity(
        &self,
        item_id: LineItemId,
        quantity: NonZeroU32,
    ) -> Result<Cart, GatewayError>;

    /// Remove a line, returning the full cart.
    async fn remove_item(&self, item_id: LineItemId) -> Result<Cart, GatewayError>;
}
