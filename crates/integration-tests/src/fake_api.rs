//! In-process cart REST API backed by a [`FakeGateway`].
//!
//! Speaks the same JSON wire format as a production cart API so the HTTP
//! gateway can be tested end to end. Requests must carry
//! `Authorization: Bearer <TOKEN>`.

use core::num::NonZeroU32;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use cart_sync::gateway::{CartGateway, GatewayError};
use cart_sync::testing::FakeGateway;
use cart_sync_core::{Cart, LineItem, LineItemId, ProductId, Resolution};

/// Bearer token the API accepts.
pub const TOKEN: &str = "test-session-token";

/// A running API server. Stops when dropped.
pub struct FakeCartApi {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl FakeCartApi {
    /// Serve the cart held by `gateway` on an ephemeral local port.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn spawn(gateway: Arc<FakeGateway>) -> std::io::Result<Self> {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let app = router(gateway);
        let handle = tokio::spawn(async move {
            // Serving ends only when the task is aborted
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self {
            base_url: format!("http://{addr}/api"),
            handle,
        })
    }
}

impl Drop for FakeCartApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(gateway: Arc<FakeGateway>) -> Router {
    Router::new()
        .route("/api/cart", get(fetch_cart))
        .route("/api/cart/items", post(add_item))
        .route("/api/cart/items/{id}", patch(set_quantity).delete(remove_item))
        .with_state(gateway)
}

#[derive(Debug, Deserialize)]
struct AddItemBody {
    product_id: ProductId,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct QuantityBody {
    quantity: u32,
}

async fn fetch_cart(State(gateway): State<Arc<FakeGateway>>, headers: HeaderMap) -> Response {
    if let Some(denied) = check_auth(&headers) {
        return denied;
    }
    respond(gateway.fetch_cart().await)
}

async fn add_item(
    State(gateway): State<Arc<FakeGateway>>,
    headers: HeaderMap,
    Json(body): Json<AddItemBody>,
) -> Response {
    if let Some(denied) = check_auth(&headers) {
        return denied;
    }
    let Some(quantity) = NonZeroU32::new(body.quantity) else {
        return rejected("Quantity must be at least 1");
    };
    respond(gateway.add_item(body.product_id, quantity).await)
}

async fn set_quantity(
    State(gateway): State<Arc<FakeGateway>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<QuantityBody>,
) -> Response {
    if let Some(denied) = check_auth(&headers) {
        return denied;
    }
    let Some(quantity) = NonZeroU32::new(body.quantity) else {
        return rejected("Quantity must be at least 1");
    };
    respond(gateway.set_quantity(LineItemId::new(id), quantity).await)
}

async fn remove_item(
    State(gateway): State<Arc<FakeGateway>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Some(denied) = check_auth(&headers) {
        return denied;
    }
    respond(gateway.remove_item(LineItemId::new(id)).await)
}

fn check_auth(headers: &HeaderMap) -> Option<Response> {
    let expected = format!("Bearer {TOKEN}");
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    (!authorized).then(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Please sign in again." })),
        )
            .into_response()
    })
}

fn rejected(message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn respond(result: Result<Cart, GatewayError>) -> Response {
    match result {
        Ok(cart) => Json(cart_body(&cart)).into_response(),
        Err(GatewayError::Rejected(message)) => rejected(&message),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

fn cart_body(cart: &Cart) -> Value {
    let items: Vec<Value> = cart.iter().map(line_body).collect();
    json!({ "items": items })
}

fn line_body(line: &LineItem) -> Value {
    let product = match line.resolve() {
        Resolution::Resolved(product) => json!({
            "id": product.id,
            "title": product.title,
            "price": product.price.to_string(),
            "discount": product.discount.is_active().then(|| product.discount.percent().to_string()),
            "stock": product.stock,
            "image": product.image,
        }),
        Resolution::Unresolved(_) => Value::Null,
    };
    json!({
        "id": line.item_id,
        "product_id": line.product.product_id(),
        "product": product,
        "quantity": line.quantity,
        "price": line.unit_price.to_string(),
    })
}
