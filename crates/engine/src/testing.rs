//! In-process test doubles.
//!
//! Enabled for this crate's own tests and, through the `test-util` feature,
//! for downstream integration tests.

use core::num::NonZeroU32;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use cart_sync_core::{Cart, LineItem, LineItemId, Product, ProductId, ProductRef};

use crate::gateway::{CartGateway, GatewayError};
use crate::notice::Notifier;

#[derive(Debug, Clone)]
struct ServerLine {
    id: LineItemId,
    product_id: ProductId,
    quantity: u32,
    price: Decimal,
}

#[derive(Debug, Default)]
struct FakeState {
    products: HashMap<ProductId, Product>,
    lines: Vec<ServerLine>,
    next_line_id: i64,
    failures: VecDeque<Option<String>>,
    delays: VecDeque<Duration>,
    calls: Vec<&'static str>,
}

impl FakeState {
    fn snapshot(&self) -> Cart {
        self.lines
            .iter()
            .map(|line| LineItem {
                item_id: Some(line.id),
                product: ProductRef::Referenced {
                    id: line.product_id,
                    product: self.products.get(&line.product_id).cloned(),
                },
                quantity: line.quantity,
                unit_price: line.price,
            })
            .collect()
    }
}

/// A server-authoritative cart held in memory.
///
/// Products must be registered before they can be added. Failures and
/// response delays can be queued to exercise error paths and out-of-order
/// responses.
#[derive(Debug, Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
}

impl FakeGateway {
    #[must_use]
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        let gateway = Self::default();
        {
            let mut state = gateway.lock();
            state.products = products.into_iter().map(|p| (p.id, p)).collect();
            state.next_line_id = 1;
        }
        gateway
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a line into the server cart directly.
    pub fn seed(&self, product_id: ProductId, quantity: u32) -> LineItemId {
        let mut state = self.lock();
        let price = state
            .products
            .get(&product_id)
            .map_or(Decimal::ZERO, |p| p.price);
        let id = LineItemId::new(state.next_line_id);
        state.next_line_id += 1;
        state.lines.push(ServerLine {
            id,
            product_id,
            quantity,
            price,
        });
        id
    }

    /// Delete a product so existing lines become stale references.
    pub fn delete_product(&self, product_id: ProductId) {
        self.lock().products.remove(&product_id);
    }

    /// Make the next call fail with [`GatewayError::Unavailable`].
    pub fn fail_next(&self, message: impl Into<String>) {
        self.lock().failures.push_back(Some(message.into()));
    }

    /// Let the next call through, so a following [`fail_next`](Self::fail_next)
    /// targets the call after it.
    pub fn pass_next(&self) {
        self.lock().failures.push_back(None);
    }

    /// Delay the response of the next call.
    pub fn delay_next(&self, delay: Duration) {
        self.lock().delays.push_back(delay);
    }

    /// Names of the operations called so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    /// Current server-side cart.
    #[must_use]
    pub fn server_cart(&self) -> Cart {
        self.lock().snapshot()
    }

    async fn respond<F>(&self, operation: &'static str, apply: F) -> Result<Cart, GatewayError>
    where
        F: FnOnce(&mut FakeState) -> Result<(), GatewayError> + Send,
    {
        let (delay, failure) = {
            let mut state = self.lock();
            state.calls.push(operation);
            (state.delays.pop_front(), state.failures.pop_front().flatten())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = failure {
            return Err(GatewayError::Unavailable(message));
        }
        let mut state = self.lock();
        apply(&mut state)?;
        Ok(state.snapshot())
    }
}

#[async_trait]
impl CartGateway for FakeGateway {
    async fn fetch_cart(&self) -> Result<Cart, GatewayError> {
        self.respond("fetch_cart", |_| Ok(())).await
    }

    async fn add_item(
        &self,
        product_id: ProductId,
        quantity: NonZeroU32,
    ) -> Result<Cart, GatewayError> {
        self.respond("add_item", move |state| {
            let price = state
                .products
                .get(&product_id)
                .map(|p| p.price)
                .ok_or_else(|| GatewayError::Rejected("Product not available".to_string()))?;
            if let Some(line) = state.lines.iter_mut().find(|l| l.product_id == product_id) {
                line.quantity = line.quantity.saturating_add(quantity.get());
            } else {
                let id = LineItemId::new(state.next_line_id);
                state.next_line_id += 1;
                state.lines.push(ServerLine {
                    id,
                    product_id,
                    quantity: quantity.get(),
                    price,
                });
            }
            Ok(())
        })
        .await
    }

    async fn set_quantity(
        &self,
        item_id: LineItemId,
        quantity: NonZeroU32,
    ) -> Result<Cart, GatewayError> {
        self.respond("set_quantity", move |state| {
            let line = state
                .lines
                .iter_mut()
                .find(|l| l.id == item_id)
                .ok_or_else(|| GatewayError::Rejected("Cart line not found".to_string()))?;
            line.quantity = quantity.get();
            Ok(())
        })
        .await
    }

    async fn remove_item(&self, item_id: LineItemId) -> Result<Cart, GatewayError> {
        self.respond("remove_item", move |state| {
            state.lines.retain(|l| l.id != item_id);
            Ok(())
        })
        .await
    }
}

/// Notifier that records every notice.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_owned());
    }
}
