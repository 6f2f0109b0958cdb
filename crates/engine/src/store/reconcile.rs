//! Identity transitions and login reconciliation.
//!
//! On login the server cart wins: by default the guest lines are discarded
//! and the in-memory cart is replaced with whatever the server holds. The
//! [`ReconcilePolicy::Merge`] policy pushes the guest lines to the server
//! first so nothing the shopper picked before signing in is lost.

use core::num::NonZeroU32;
use std::str::FromStr;
use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use cart_sync_core::Cart;

use super::{CartStore, InFlight};
use crate::error::{Result, add_breadcrumb, report};
use crate::identity::{Identity, IdentityChange};

/// What happens to guest lines when the session authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Keep only the server cart.
    #[default]
    Discard,
    /// Add every guest line to the server cart, then keep the server cart.
    Merge,
}

#[derive(Debug, Error)]
#[error("Unknown reconcile policy: {0} (expected \"discard\" or \"merge\")")]
pub struct UnknownReconcilePolicy(pub String);

impl FromStr for ReconcilePolicy {
    type Err = UnknownReconcilePolicy;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discard" => Ok(Self::Discard),
            "merge" => Ok(Self::Merge),
            other => Err(UnknownReconcilePolicy(other.to_string())),
        }
    }
}

impl CartStore {
    /// Record the session identity.
    ///
    /// A guest to authenticated transition arms reconciliation; call
    /// [`reconcile_on_login`](Self::reconcile_on_login) to run it. Returning
    /// to guest drops any pending reconciliation and restores the cart saved
    /// on this device. Repeating the current identity changes nothing.
    pub fn set_identity(&self, identity: Identity) -> IdentityChange {
        let mut change = IdentityChange::Unchanged;
        let inner = &self.inner;
        inner.state.send_if_modified(|snapshot| {
            change = match (snapshot.identity, identity) {
                (Identity::Guest, Identity::Authenticated) => {
                    inner.reconcile_pending.store(true, Ordering::SeqCst);
                    snapshot.identity = Identity::Authenticated;
                    IdentityChange::LoggedIn
                }
                (Identity::Authenticated, Identity::Guest) => {
                    inner.reconcile_pending.store(false, Ordering::SeqCst);
                    snapshot.identity = Identity::Guest;
                    snapshot.cart = inner.storage.load();
                    snapshot.last_error = None;
                    IdentityChange::LoggedOut
                }
                _ => IdentityChange::Unchanged,
            };
            change != IdentityChange::Unchanged
        });

        match change {
            IdentityChange::LoggedIn => {
                add_breadcrumb("auth", "Session authenticated", None);
                info!(store_id = %inner.id, "Session authenticated; reconciliation pending");
            }
            IdentityChange::LoggedOut => {
                add_breadcrumb("auth", "Session ended", None);
                info!(store_id = %inner.id, "Session returned to guest");
            }
            IdentityChange::Unchanged => {}
        }
        change
    }

    /// Authenticate the session and reconcile immediately.
    ///
    /// # Errors
    ///
    /// See [`reconcile_on_login`](Self::reconcile_on_login).
    pub async fn login(&self) -> Result<bool> {
        self.set_identity(Identity::Authenticated);
        self.reconcile_on_login().await
    }

    /// Replace the cart with the server's after a login.
    ///
    /// Runs at most once per guest to authenticated transition: returns
    /// `Ok(false)` if no transition is pending. On success the guest record
    /// on this device is erased. On failure the cart is left as it was and
    /// reconciliation is re-armed so a later call can retry.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Sync`](crate::CartError::Sync) if the gateway is
    /// missing or a gateway call fails.
    #[instrument(skip(self), fields(store_id = %self.inner.id))]
    pub async fn reconcile_on_login(&self) -> Result<bool> {
        if !self.inner.reconcile_pending.swap(false, Ordering::SeqCst) {
            debug!("No login transition pending");
            return Ok(false);
        }

        let result = self.run_reconciliation().await;
        if result.is_err() && self.identity() == Identity::Authenticated {
            self.inner.reconcile_pending.store(true, Ordering::SeqCst);
            warn!("Reconciliation failed; will retry on next attempt");
        }
        result.map(|()| true)
    }

    async fn run_reconciliation(&self) -> Result<()> {
        let guest_cart = self.inner.storage.load();
        match self.inner.reconcile_policy {
            ReconcilePolicy::Merge => self.push_guest_lines(guest_cart).await?,
            ReconcilePolicy::Discard if !guest_cart.is_empty() => {
                info!(
                    discarded_lines = guest_cart.len(),
                    "Discarding guest cart in favor of server cart"
                );
            }
            ReconcilePolicy::Discard => {}
        }

        self.sync("reconcile_on_login", |gateway| async move {
            gateway.fetch_cart().await
        })
        .await?;

        if let Err(e) = self.inner.storage.erase() {
            warn!(error = %e, "Failed to erase guest cart after login");
        }
        info!(lines = self.inner.state.borrow().cart.len(), "Reconciled cart with server");
        Ok(())
    }

    /// Add each guest line to the server cart.
    ///
    /// Responses are not published; only the final fetch replaces the cart.
    /// Each pushed line is dropped from the guest record so a retry after a
    /// partial failure pushes only the lines still outstanding.
    async fn push_guest_lines(&self, mut remaining: Cart) -> Result<()> {
        if remaining.is_empty() {
            return Ok(());
        }
        let gateway = self.gateway().inspect_err(|e| report("reconcile_merge", e))?;

        let pending: Vec<_> = remaining
            .iter()
            .map(|line| (line.key(), line.product.product_id(), line.quantity))
            .collect();
        let mut merged = 0_usize;
        for (key, product_id, quantity) in pending {
            let Some(quantity) = NonZeroU32::new(quantity) else {
                continue;
            };
            let in_flight = InFlight::start(&self.inner.state);
            if let Err(e) = gateway.add_item(product_id, quantity).await {
                warn!(merged, outstanding = remaining.len(), "Guest cart merge interrupted");
                return Err(Self::fail(in_flight, "reconcile_merge", e));
            }
            in_flight.finish(|_| {});
            merged += 1;

            remaining.remove(&key);
            if let Err(e) = self.inner.storage.save(&remaining) {
                warn!(error = %e, %key, "Failed to record merged guest line");
            }
        }
        info!(merged_lines = merged, "Merged guest cart into server cart");
        Ok(())
    }
}
