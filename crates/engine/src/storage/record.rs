//! Versioned guest cart record encoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use cart_sync_core::Cart;

/// Fixed key the guest cart is stored under.
pub const GUEST_CART_KEY: &str = "cart";

/// Current record schema version.
pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct GuestCartRecord {
    version: u32,
    saved_at: DateTime<Utc>,
    items: Cart,
}

/// Serialize a cart into the current record format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_record(cart: &Cart) -> Result<String, serde_json::Error> {
    serde_json::to_string(&GuestCartRecord {
        version: RECORD_VERSION,
        saved_at: Utc::now(),
        items: cart.clone(),
    })
}

/// Decode a stored record into a cart.
///
/// Never fails: malformed input and unknown future versions decode to an
/// empty cart and are logged at `warn`.
#[must_use]
pub fn decode_record(raw: &str) -> Cart {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Discarding unparseable guest cart record");
            return Cart::new();
        }
    };

    // Version 0: a bare array of line items.
    if value.is_array() {
        return serde_json::from_value::<Cart>(value).unwrap_or_else(|e| {
            warn!(error = %e, "Discarding malformed legacy guest cart record");
            Cart::new()
        });
    }

    let version = value
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);
    if version > u64::from(RECORD_VERSION) {
        warn!(
            version,
            supported = RECORD_VERSION,
            "Discarding guest cart record with newer schema version"
        );
        return Cart::new();
    }

    match serde_json::from_value::<GuestCartRecord>(value) {
        Ok(record) => record.items,
        Err(e) => {
            warn!(error = %e, "Discarding malformed guest cart record");
            Cart::new()
        }
    }
}
