//! The cart store.
//!
//! [`CartStore`] is the single authority for cart state. It is a cheap,
//! cloneable handle; clones share one store.
//!
//! # Guest sessions
//!
//! Mutations apply to the in-memory cart and are written through to
//! [`GuestCartStorage`] before observers are notified. If the write fails the
//! mutation is rolled back and an error returned, so memory and storage never
//! disagree.
//!
//! # Authenticated sessions
//!
//! Mutations are sent to the [`CartGateway`] and the in-memory cart is
//! replaced wholesale by the server's response. Nothing is applied
//! optimistically: a failed call leaves the cart untouched. When several
//! calls overlap, whichever response arrives last wins. Responses that
//! arrive after the session has returned to guest are discarded.
//!
//! # Observing
//!
//! [`CartStore::subscribe`] hands out a `watch` receiver of
//! [`CartSnapshot`]s. Totals are not part of the snapshot; derive them with
//! [`CartStore::breakdown`] or [`compute_breakdown`] so they never go stale.

mod reconcile;
mod state;

use core::future::Future;
use core::num::NonZeroU32;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use cart_sync_core::{Cart, ItemKey, LineItemId, Product, ProductId};

use crate::catalog::ProductCatalog;
use crate::config::EngineConfig;
use crate::error::{CartError, Result, add_breadcrumb, report};
use crate::gateway::{CartGateway, GatewayError};
use crate::identity::{self, Identity};
use crate::notice::{LogNotifier, Notifier};
use crate::pricing::{PricingBreakdown, PricingPolicy, compute_breakdown};
use crate::storage::GuestCartStorage;
use crate::visibility::VisibilityController;

pub use reconcile::{ReconcilePolicy, UnknownReconcilePolicy};
pub use state::{CartPhase, CartSnapshot};

/// Handle to a cart store.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

/// Non-owning handle to a cart store, held by background tasks.
#[derive(Clone)]
pub struct WeakCartStore {
    inner: Weak<CartStoreInner>,
}

impl WeakCartStore {
    #[must_use]
    pub fn upgrade(&self) -> Option<CartStore> {
        self.inner.upgrade().map(|inner| CartStore { inner })
    }
}

struct CartStoreInner {
    id: Uuid,
    pricing: PricingPolicy,
    reconcile_policy: ReconcilePolicy,
    storage: Arc<dyn GuestCartStorage>,
    gateway: Option<Arc<dyn CartGateway>>,
    notifier: Arc<dyn Notifier>,
    visibility: VisibilityController,
    state: watch::Sender<CartSnapshot>,
    reconcile_pending: AtomicBool,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for CartStoreInner {
    fn drop(&mut self) {
        let watcher = self
            .watcher
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = watcher {
            handle.abort();
        }
    }
}

/// Builder for [`CartStore`].
pub struct CartStoreBuilder {
    storage: Arc<dyn GuestCartStorage>,
    gateway: Option<Arc<dyn CartGateway>>,
    pricing: PricingPolicy,
    reconcile_policy: ReconcilePolicy,
    notifier: Arc<dyn Notifier>,
    visibility: VisibilityController,
}

impl CartStoreBuilder {
    /// Remote cart API used once the session authenticates.
    #[must_use]
    pub fn gateway(mut self, gateway: Arc<dyn CartGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    #[must_use]
    pub fn pricing(mut self, pricing: PricingPolicy) -> Self {
        self.pricing = pricing;
        self
    }

    #[must_use]
    pub fn reconcile_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.reconcile_policy = policy;
        self
    }

    /// Receiver for user-facing notices. Defaults to [`LogNotifier`].
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Share a panel controller with the UI layer.
    #[must_use]
    pub fn visibility(mut self, visibility: VisibilityController) -> Self {
        self.visibility = visibility;
        self
    }

    /// Apply pricing and reconcile settings from configuration.
    #[must_use]
    pub fn config(self, config: &EngineConfig) -> Self {
        self.pricing(config.pricing)
            .reconcile_policy(config.reconcile_policy)
    }

    /// Create the store as a guest session, restoring the cart saved on this
    /// device.
    #[must_use]
    pub fn build(self) -> CartStore {
        let id = Uuid::new_v4();
        let cart = self.storage.load();
        info!(
            store_id = %id,
            lines = cart.len(),
            gateway = self.gateway.is_some(),
            policy = ?self.reconcile_policy,
            "Cart store created"
        );
        let (state, _) = watch::channel(CartSnapshot::guest(cart));
        CartStore {
            inner: Arc::new(CartStoreInner {
                id,
                pricing: self.pricing,
                reconcile_policy: self.reconcile_policy,
                storage: self.storage,
                gateway: self.gateway,
                notifier: self.notifier,
                visibility: self.visibility,
                state,
                reconcile_pending: AtomicBool::new(false),
                watcher: Mutex::new(None),
            }),
        }
    }
}

/// Tracks one outstanding gateway call in the snapshot.
///
/// Dropping the guard without calling [`finish`](Self::finish), as happens
/// when the awaiting future is cancelled, still releases the call.
struct InFlight<'a> {
    state: &'a watch::Sender<CartSnapshot>,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn start(state: &'a watch::Sender<CartSnapshot>) -> Self {
        state.send_modify(|snapshot| snapshot.in_flight += 1);
        Self { state, armed: true }
    }

    /// Release the call and apply its outcome in a single notification.
    fn finish(mut self, apply: impl FnOnce(&mut CartSnapshot)) {
        self.armed = false;
        self.state.send_modify(|snapshot| {
            snapshot.in_flight = snapshot.in_flight.saturating_sub(1);
            apply(snapshot);
        });
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_modify(|snapshot| {
                snapshot.in_flight = snapshot.in_flight.saturating_sub(1);
            });
        }
    }
}

impl CartStore {
    /// Start building a store that persists guest carts to `storage`.
    #[must_use]
    pub fn builder(storage: Arc<dyn GuestCartStorage>) -> CartStoreBuilder {
        CartStoreBuilder {
            storage,
            gateway: None,
            pricing: PricingPolicy::default(),
            reconcile_policy: ReconcilePolicy::default(),
            notifier: Arc::new(LogNotifier),
            visibility: VisibilityController::new(),
        }
    }

    /// Identifier used to correlate this store's log lines.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakCartStore {
        WeakCartStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn cart(&self) -> Cart {
        self.inner.state.borrow().cart.clone()
    }

    /// Totals for the current cart, computed on every call.
    #[must_use]
    pub fn breakdown(&self) -> PricingBreakdown {
        compute_breakdown(&self.inner.state.borrow().cart, &self.inner.pricing)
    }

    #[must_use]
    pub fn phase(&self) -> CartPhase {
        self.inner.state.borrow().phase()
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        self.inner.state.borrow().identity
    }

    /// Whether any gateway call is awaiting a response.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.state.borrow().is_pending()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.state.borrow().last_error.clone()
    }

    /// Receiver notified after every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn visibility(&self) -> &VisibilityController {
        &self.inner.visibility
    }

    #[must_use]
    pub fn pricing(&self) -> &PricingPolicy {
        &self.inner.pricing
    }

    /// Whether authenticated sessions can reach a cart API.
    #[must_use]
    pub fn has_gateway(&self) -> bool {
        self.inner.gateway.is_some()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of `product`; zero is treated as one.
    ///
    /// Guests get the units folded into the existing line for the product or
    /// a new line. Authenticated sessions ask the gateway; if that fails the
    /// shopper is notified and the cart is unchanged. The cart panel opens
    /// only when the add succeeds.
    ///
    /// # Errors
    ///
    /// - [`CartError::Validation`] if the product has a negative price
    /// - [`CartError::Persistence`] if the guest cart cannot be saved
    /// - [`CartError::Sync`] if the gateway call fails
    #[instrument(
        skip_all,
        fields(store_id = %self.inner.id, product_id = %product.id, quantity = quantity)
    )]
    pub async fn add_item(&self, product: Product, quantity: u32) -> Result<()> {
        let quantity = NonZeroU32::new(quantity).unwrap_or(NonZeroU32::MIN);
        let product_id = product.id.to_string();
        add_breadcrumb(
            "cart",
            "Add to cart",
            Some(&[("product_id", product_id.as_str())]),
        );

        let result = match self.identity() {
            Identity::Guest => self.add_guest(product, quantity).map(|()| true),
            Identity::Authenticated => {
                let product_id = product.id;
                let result = self
                    .sync("add_item", |gateway| async move {
                        gateway.add_item(product_id, quantity).await
                    })
                    .await;
                if let Err(e) = &result {
                    self.inner.notifier.alert(&e.user_message());
                }
                result
            }
        };

        if let Ok(true) = result {
            self.inner.visibility.open();
        }
        result.map(drop)
    }

    /// Look up a product in `catalog` and add it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownProduct`] if the catalog has no such
    /// product, [`CartError::Catalog`] if the lookup fails, otherwise as
    /// [`add_item`](Self::add_item).
    pub async fn add_product(
        &self,
        catalog: &dyn ProductCatalog,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<()> {
        let product = catalog
            .product(product_id)
            .await?
            .ok_or(CartError::UnknownProduct(product_id))?;
        self.add_item(product, quantity).await
    }

    /// Remove a line. Removing a line that isn't there is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Persistence`] or [`CartError::Sync`].
    #[instrument(skip(self), fields(store_id = %self.inner.id))]
    pub async fn remove_item(&self, key: ItemKey) -> Result<()> {
        match self.identity() {
            Identity::Guest => {
                if !self.mutate_guest(|cart| cart.remove(&key).is_some())? {
                    debug!(%key, "Remove of absent line ignored");
                }
                Ok(())
            }
            Identity::Authenticated => {
                let Some(item_id) = self.server_line_id(&key) else {
                    debug!(%key, "Remove of absent line ignored");
                    return Ok(());
                };
                self.sync("remove_item", |gateway| async move {
                    gateway.remove_item(item_id).await
                })
                .await
                .map(drop)
            }
        }
    }

    /// Set a line's quantity. Zero or less removes the line.
    ///
    /// # Errors
    ///
    /// - [`CartError::NotFound`] if the line is not in the cart
    /// - [`CartError::Persistence`] or [`CartError::Sync`] as for the other
    ///   mutations
    #[instrument(skip(self), fields(store_id = %self.inner.id))]
    pub async fn set_quantity(&self, key: ItemKey, quantity: i64) -> Result<()> {
        if quantity <= 0 {
            return self.remove_item(key).await;
        }
        let quantity = u32::try_from(quantity)
            .ok()
            .and_then(NonZeroU32::new)
            .unwrap_or(NonZeroU32::MAX);

        match self.identity() {
            Identity::Guest => {
                if self.mutate_guest(|cart| cart.set_quantity(&key, quantity))? {
                    Ok(())
                } else {
                    Err(CartError::NotFound(key))
                }
            }
            Identity::Authenticated => {
                let item_id = self
                    .server_line_id(&key)
                    .ok_or(CartError::NotFound(key))?;
                self.sync("set_quantity", |gateway| async move {
                    gateway.set_quantity(item_id, quantity).await
                })
                .await
                .map(drop)
            }
        }
    }

    /// Empty the cart and erase the guest record on this device.
    ///
    /// Never contacts the gateway, so an authenticated session's server cart
    /// is left as it is.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Persistence`] if the guest record cannot be
    /// erased; the in-memory cart is then left unchanged.
    pub fn clear(&self) -> Result<()> {
        self.inner.storage.erase()?;
        self.inner.state.send_if_modified(|snapshot| {
            let changed = !snapshot.cart.is_empty() || snapshot.last_error.is_some();
            snapshot.cart.clear();
            snapshot.last_error = None;
            changed
        });
        add_breadcrumb("cart", "Cleared cart", None);
        info!(store_id = %self.inner.id, "Cleared cart");
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Follow an identity signal, reconciling on each login.
    ///
    /// Replaces any previously attached signal. Must be called from within a
    /// Tokio runtime.
    pub fn attach_identity(&self, signal: watch::Receiver<Identity>) {
        let handle = identity::spawn_watcher(self.downgrade(), signal);
        let previous = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop following the identity signal and close the cart panel.
    pub fn dispose(&self) {
        let watcher = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = watcher {
            handle.abort();
        }
        self.inner.visibility.close();
        debug!(store_id = %self.inner.id, "Cart store disposed");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn add_guest(&self, product: Product, quantity: NonZeroU32) -> Result<()> {
        if product.price.is_sign_negative() && !product.price.is_zero() {
            return Err(CartError::Validation(format!(
                "product {} has a negative price",
                product.id
            )));
        }
        let product_id = product.id;
        self.mutate_guest(|cart| {
            let total = cart.add(product, quantity);
            debug!(%product_id, quantity = total, "Guest line updated");
            true
        })?;
        Ok(())
    }

    /// Apply `op` to a copy of the guest cart, persist it, then publish it.
    ///
    /// `op` returns whether it changed anything; unchanged carts are neither
    /// saved nor published.
    fn mutate_guest(&self, op: impl FnOnce(&mut Cart) -> bool) -> Result<bool> {
        let mut outcome = Ok(false);
        self.inner.state.send_if_modified(|snapshot| {
            let mut next = snapshot.cart.clone();
            if !op(&mut next) {
                return false;
            }
            if let Err(e) = self.inner.storage.save(&next) {
                outcome = Err(CartError::Persistence(e));
                return false;
            }
            snapshot.cart = next;
            outcome = Ok(true);
            true
        });
        if let Err(e) = &outcome {
            report("guest_save", e);
        }
        outcome
    }

    /// Server line id for a key in the authenticated cart.
    ///
    /// Product keys match the line holding that product.
    fn server_line_id(&self, key: &ItemKey) -> Option<LineItemId> {
        let snapshot = self.inner.state.borrow();
        match key {
            ItemKey::Line(_) => snapshot.cart.get(key),
            ItemKey::Product(id) => snapshot.cart.find_product(*id),
        }
        .and_then(|line| line.item_id)
    }

    fn gateway(&self) -> Result<Arc<dyn CartGateway>> {
        self.inner.gateway.clone().ok_or_else(|| {
            CartError::Sync(GatewayError::Unavailable(
                "no cart gateway configured".to_string(),
            ))
        })
    }

    /// Run one gateway call and replace the cart with its response.
    ///
    /// The response is applied only while the session is still
    /// authenticated; returns whether it was.
    async fn sync<F, Fut>(&self, operation: &'static str, call: F) -> Result<bool>
    where
        F: FnOnce(Arc<dyn CartGateway>) -> Fut,
        Fut: Future<Output = std::result::Result<Cart, GatewayError>>,
    {
        let gateway = match self.gateway() {
            Ok(gateway) => gateway,
            Err(e) => {
                report(operation, &e);
                return Err(e);
            }
        };

        let in_flight = InFlight::start(&self.inner.state);
        match call(gateway).await {
            Ok(cart) => {
                let lines = cart.len();
                let mut applied = false;
                in_flight.finish(|snapshot| {
                    if snapshot.identity == Identity::Authenticated {
                        snapshot.cart = cart;
                        snapshot.last_error = None;
                        applied = true;
                    }
                });
                if applied {
                    debug!(operation, lines, "Applied server cart");
                } else {
                    debug!(operation, "Discarded server cart received after logout");
                }
                Ok(applied)
            }
            Err(e) => Err(Self::fail(in_flight, operation, e)),
        }
    }

    /// Release a failed call, recording and reporting its error.
    fn fail(in_flight: InFlight<'_>, operation: &'static str, e: GatewayError) -> CartError {
        let err = CartError::Sync(e);
        let message = err.user_message();
        in_flight.finish(|snapshot| snapshot.last_error = Some(message));
        report(operation, &err);
        err
    }
}
