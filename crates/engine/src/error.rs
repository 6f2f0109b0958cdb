//! Unified cart error handling with Sentry integration.
//!
//! Every fallible [`CartStore`](crate::store::CartStore) operation returns
//! [`CartError`]. Gateway failures are reported to Sentry before being handed
//! back to the caller; [`CartError::user_message`] gives the text that is safe
//! to show to a shopper.

use thiserror::Error;

use cart_sync_core::{ItemKey, ProductId};

use crate::catalog::CatalogError;
use crate::gateway::GatewayError;
use crate::storage::StorageError;

/// Store-level error type.
#[derive(Debug, Error)]
pub enum CartError {
    /// Attempt to put a line into an invalid state.
    #[error("Invalid cart operation: {0}")]
    Validation(String),

    /// Remote cart gateway call failed.
    #[error("Cart sync failed: {0}")]
    Sync(#[from] GatewayError),

    /// The referenced line is not in the cart.
    #[error("Cart item not found: {0}")]
    NotFound(ItemKey),

    /// The catalog has no product with this id.
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    /// Product catalog lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Guest cart could not be written or erased.
    #[error("Guest cart storage error: {0}")]
    Persistence(#[from] StorageError),
}

impl CartError {
    /// Human-readable message for end users.
    ///
    /// Internal details (status codes, transport errors, file paths) are
    /// never included.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Sync(GatewayError::RateLimited(secs)) => {
                format!("Too many cart updates. Please try again in {secs} seconds.")
            }
            Self::Sync(GatewayError::Rejected(msg)) => msg.clone(),
            Self::Sync(_) => {
                "We couldn't update your cart. Please check your connection and try again."
                    .to_string()
            }
            Self::NotFound(_) => "That item is no longer in your cart.".to_string(),
            Self::UnknownProduct(_) => "That product is no longer available.".to_string(),
            Self::Catalog(_) => "Product details are temporarily unavailable.".to_string(),
            Self::Persistence(_) => "Your cart couldn't be saved on this device.".to_string(),
        }
    }

    /// Whether the error came from the remote gateway.
    #[must_use]
    pub const fn is_sync(&self) -> bool {
        matches!(self, Self::Sync(_))
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Capture a gateway failure to Sentry and log it.
///
/// Other error kinds are expected outcomes of user input and are only logged
/// at debug level.
pub fn report(operation: &'static str, err: &CartError) {
    if err.is_sync() {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            operation,
            error = %err,
            sentry_event_id = %event_id,
            "Cart sync error"
        );
    } else {
        tracing::debug!(operation, error = %err, "Cart operation rejected");
    }
}

/// Add a breadcrumb for a cart action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// mutations leading up to a sync failure.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cart_sync_core::LineItemId;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::NotFound(ItemKey::Line(LineItemId::new(3)));
        assert_eq!(err.to_string(), "Cart item not found: line:3");

        let err = CartError::UnknownProduct(ProductId::new(12));
        assert_eq!(err.to_string(), "Unknown product: 12");
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = CartError::Sync(GatewayError::Status {
            status: 502,
            body: "upstream exploded at 10.0.0.4".to_string(),
        });
        let message = err.user_message();
        assert!(!message.contains("10.0.0.4"));
        assert!(!message.contains("502"));
    }

    #[test]
    fn test_user_message_passes_server_rejection() {
        let err = CartError::Sync(GatewayError::Rejected("Only 2 left in stock".to_string()));
        assert_eq!(err.user_message(), "Only 2 left in stock");
    }

    #[test]
    fn test_user_message_rate_limited() {
        let err = CartError::Sync(GatewayError::RateLimited(30));
        assert!(err.user_message().contains("30 seconds"));
    }

    #[test]
    fn test_is_sync() {
        assert!(CartError::Sync(GatewayError::Unavailable("down".to_string())).is_sync());
        assert!(!CartError::Validation("bad".to_string()).is_sync());
    }
}
