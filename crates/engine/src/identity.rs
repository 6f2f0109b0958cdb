//! Session identity and login-triggered reconciliation.
//!
//! The identity signal is owned by the authentication layer; the cart only
//! consumes it. [`spawn_watcher`] forwards every change to the store and runs
//! reconciliation once per guest to authenticated transition, however many
//! times the signal re-emits the same value.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::WeakCartStore;

/// Who the current session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// Not logged in; the cart lives on this device.
    #[default]
    Guest,
    /// Logged in; the server holds the authoritative cart.
    Authenticated,
}

/// Effect of an identity update on the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityChange {
    /// Same identity as before.
    Unchanged,
    /// Guest to authenticated; reconciliation is now pending.
    LoggedIn,
    /// Authenticated to guest.
    LoggedOut,
}

/// Drive a store from an identity signal until the signal or store goes away.
///
/// The task holds only a weak reference, so it never keeps a disposed store
/// alive.
pub(crate) fn spawn_watcher(
    store: WeakCartStore,
    mut identity: watch::Receiver<Identity>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let current = *identity.borrow_and_update();
            let Some(store) = store.upgrade() else {
                debug!("Cart store dropped; stopping identity watcher");
                break;
            };

            if store.set_identity(current) == IdentityChange::LoggedIn
                && let Err(e) = store.reconcile_on_login().await
            {
                warn!(error = %e, "Login reconciliation failed");
            }
            drop(store);

            if identity.changed().await.is_err() {
                debug!("Identity signal closed; stopping identity watcher");
                break;
            }
        }
    })
}
