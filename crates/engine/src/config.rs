//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CART_GATEWAY_URL` - Base URL of the remote cart API (absent: guest-only)
//! - `CART_GATEWAY_TOKEN` - Bearer token for the cart API (required with the URL)
//! - `CART_STORAGE_PATH` - Guest cart record file (default: `guest_cart.json`)
//! - `CART_TAX_RATE` - Tax rate as a fraction (default: 0.10)
//! - `CART_FREE_SHIPPING_THRESHOLD` - Subtotal for free shipping (default: 100)
//! - `CART_FLAT_SHIPPING` - Shipping fee below the threshold (default: 15)
//! - `CART_CURRENCY` - ISO 4217 code (default: USD)
//! - `CART_RECONCILE_POLICY` - `discard` or `merge` (default: discard)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use cart_sync_core::CurrencyCode;

use crate::pricing::PricingPolicy;
use crate::store::ReconcilePolicy;

const DEFAULT_STORAGE_PATH: &str = "guest_cart.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Remote cart API, if authenticated sessions are supported
    pub gateway: Option<GatewayConfig>,
    /// Guest cart record location
    pub storage_path: PathBuf,
    /// Tax, shipping and currency rules
    pub pricing: PricingPolicy,
    /// What happens to guest lines on login
    pub reconcile_policy: ReconcilePolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Remote cart API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL (e.g., `https://shop.example.com/api`)
    pub base_url: Url,
    /// Bearer token for the authenticated session
    pub token: SecretString,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gateway: None,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            pricing: PricingPolicy::default(),
            reconcile_policy: ReconcilePolicy::default(),
            sentry_dsn: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid, or if the
    /// gateway URL is set without a token.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            tax_rate: parse_env_or("CART_TAX_RATE", defaults.tax_rate)?,
            free_shipping_threshold: parse_env_or(
                "CART_FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
            flat_shipping: parse_env_or("CART_FLAT_SHIPPING", defaults.flat_shipping)?,
            currency: parse_env_or("CART_CURRENCY", CurrencyCode::default())?,
        };
        validate_pricing(&pricing)?;

        Ok(Self {
            gateway: GatewayConfig::from_env()?,
            storage_path: get_optional_env("CART_STORAGE_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from),
            pricing,
            reconcile_policy: parse_env_or("CART_RECONCILE_POLICY", ReconcilePolicy::default())?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }
}

impl GatewayConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(raw_url) = get_optional_env("CART_GATEWAY_URL") else {
            return Ok(None);
        };
        let base_url = parse_value::<Url>("CART_GATEWAY_URL", &raw_url)?;
        let token = get_required_env("CART_GATEWAY_TOKEN").map(SecretString::from)?;
        Ok(Some(Self { base_url, token }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an optional environment variable, falling back to a default.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

/// Parse a raw value, attributing failures to `key`.
fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Reject negative amounts and tax rates of 100% or more.
fn validate_pricing(pricing: &PricingPolicy) -> Result<(), ConfigError> {
    if pricing.tax_rate.is_sign_negative() || pricing.tax_rate >= Decimal::ONE {
        return Err(ConfigError::InvalidEnvVar(
            "CART_TAX_RATE".to_string(),
            format!("must be a fraction in [0, 1) (got {})", pricing.tax_rate),
        ));
    }
    if pricing.free_shipping_threshold.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            "CART_FREE_SHIPPING_THRESHOLD".to_string(),
            "must not be negative".to_string(),
        ));
    }
    if pricing.flat_shipping.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            "CART_FLAT_SHIPPING".to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.gateway.is_none());
        assert_eq!(config.storage_path, PathBuf::from("guest_cart.json"));
        assert_eq!(config.pricing, PricingPolicy::default());
        assert_eq!(config.reconcile_policy, ReconcilePolicy::Discard);
    }

    #[test]
    fn test_parse_value_decimal() {
        let rate: Decimal = parse_value("CART_TAX_RATE", " 0.08 ").unwrap();
        assert_eq!(rate, Decimal::new(8, 2));
    }

    #[test]
    fn test_parse_value_invalid() {
        let err = parse_value::<Decimal>("CART_TAX_RATE", "ten percent").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "CART_TAX_RATE"));
    }

    #[test]
    fn test_parse_value_policy_and_currency() {
        assert_eq!(
            parse_value::<ReconcilePolicy>("CART_RECONCILE_POLICY", "merge").unwrap(),
            ReconcilePolicy::Merge
        );
        assert!(parse_value::<CurrencyCode>("CART_CURRENCY", "DOGE").is_err());
    }

    #[test]
    fn test_validate_pricing_rejects_bad_tax() {
        let pricing = PricingPolicy {
            tax_rate: Decimal::from(10),
            ..PricingPolicy::default()
        };
        assert!(validate_pricing(&pricing).is_err());
        assert!(validate_pricing(&PricingPolicy::default()).is_ok());
    }

    #[test]
    fn test_validate_pricing_rejects_negative_shipping() {
        let pricing = PricingPolicy {
            flat_shipping: Decimal::from(-1),
            ..PricingPolicy::default()
        };
        assert!(validate_pricing(&pricing).is_err());
    }

    #[test]
    fn test_gateway_config_debug_redacts_token() {
        let config = GatewayConfig {
            base_url: "https://shop.example.com/api".parse().unwrap(),
            token: SecretString::from("super-sensitive"),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-sensitive"));
    }
}
