//! JSON REST implementation of [`CartGateway`].
//!
//! # Endpoints
//!
//! | Operation      | Request                               |
//! |----------------|---------------------------------------|
//! | `fetch_cart`   | `GET    {base}/cart`                  |
//! | `add_item`     | `POST   {base}/cart/items`            |
//! | `set_quantity` | `PATCH  {base}/cart/items/{item_id}`  |
//! | `remove_item`  | `DELETE {base}/cart/items/{item_id}`  |
//!
//! Every endpoint responds with the full cart. Requests are authenticated
//! with the session's bearer token.

use core::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use cart_sync_core::{Cart, LineItemId, ProductId};

use super::conversions::{
    AddItemRequest, CartResponse, ErrorBody, SetQuantityRequest, convert_cart,
};
use super::{CartGateway, GatewayError};
use crate::config::GatewayConfig;

/// Maximum number of response body characters kept in logs and errors.
const BODY_PREVIEW_CHARS: usize = 200;

/// HTTP client for the remote cart API.
#[derive(Clone)]
pub struct HttpCartGateway {
    inner: Arc<HttpCartGatewayInner>,
}

struct HttpCartGatewayInner {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl HttpCartGateway {
    /// Create a new gateway client.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            inner: Arc::new(HttpCartGatewayInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
                token: config.token.clone(),
            }),
        }
    }

    fn cart_url(&self) -> String {
        format!("{}/cart", self.inner.base_url)
    }

    fn items_url(&self) -> String {
        format!("{}/cart/items", self.inner.base_url)
    }

    fn item_url(&self, item_id: LineItemId) -> String {
        format!("{}/cart/items/{item_id}", self.inner.base_url)
    }

    /// Send a request and decode the cart in the response.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Cart, GatewayError> {
        let response = request
            .bearer_auth(self.inner.token.expose_secret())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(GatewayError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %preview(&response_text),
                "Cart API returned non-success status"
            );
            // Client errors usually carry a message meant for the shopper
            if status.is_client_error()
                && let Ok(body) = serde_json::from_str::<ErrorBody>(&response_text)
            {
                return Err(GatewayError::Rejected(body.error));
            }
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: preview(&response_text),
            });
        }

        let response: CartResponse = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %preview(&response_text),
                    "Failed to parse cart API response"
                );
                return Err(GatewayError::Parse(e));
            }
        };

        let cart = convert_cart(response);
        debug!(lines = cart.len(), "Received cart from gateway");
        Ok(cart)
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[async_trait]
impl CartGateway for HttpCartGateway {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<Cart, GatewayError> {
        let request = self.inner.client.get(self.cart_url());
        self.execute(request).await
    }

    #[instrument(skip_all, fields(product_id = %product_id, quantity = quantity.get()))]
    async fn add_item(
        &self,
        product_id: ProductId,
        quantity: NonZeroU32,
    ) -> Result<Cart, GatewayError> {
        let request = self.inner.client.post(self.items_url()).json(&AddItemRequest {
            product_id,
            quantity: quantity.get(),
        });
        self.execute(request).await
    }

    #[instrument(skip_all, fields(item_id = %item_id, quantity = quantity.get()))]
    async fn set_quantity(
        &self,
        item_id: LineItemId,
        quantity: NonZeroU32,
    ) -> Result<Cart, GatewayError> {
        let request = self
            .inner
            .client
            .patch(self.item_url(item_id))
            .json(&SetQuantityRequest {
                quantity: quantity.get(),
            });
        self.execute(request).await
    }

    #[instrument(skip_all, fields(item_id = %item_id))]
    async fn remove_item(&self, item_id: LineItemId) -> Result<Cart, GatewayError> {
        let request = self.inner.client.delete(self.item_url(item_id));
        self.execute(request).await
    }
}
