//! Observable cart state.

use serde::Serialize;

use cart_sync_core::Cart;

use crate::identity::Identity;

/// Everything an observer of the cart needs, published as one value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CartSnapshot {
    pub cart: Cart,
    pub identity: Identity,
    /// Gateway calls currently awaiting a response.
    pub in_flight: usize,
    /// User-facing message of the most recent failed gateway call.
    pub last_error: Option<String>,
}

impl CartSnapshot {
    pub(crate) const fn guest(cart: Cart) -> Self {
        Self {
            cart,
            identity: Identity::Guest,
            in_flight: 0,
            last_error: None,
        }
    }

    /// Whether a gateway call is outstanding.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.in_flight > 0
    }

    #[must_use]
    pub fn phase(&self) -> CartPhase {
        match self.identity {
            Identity::Guest if self.cart.is_empty() => CartPhase::GuestEmpty,
            Identity::Guest => CartPhase::GuestPopulated,
            Identity::Authenticated if self.is_pending() => CartPhase::Syncing,
            Identity::Authenticated if self.cart.is_empty() => CartPhase::AuthenticatedEmpty,
            Identity::Authenticated => CartPhase::AuthenticatedPopulated,
        }
    }
}

/// Lifecycle phase of the cart.
///
/// A failed sync is not a resting phase: the store returns to the phase
/// matching its unchanged cart and records the failure in
/// [`CartSnapshot::last_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartPhase {
    GuestEmpty,
    GuestPopulated,
    /// Authenticated with a gateway call in flight.
    Syncing,
    AuthenticatedEmpty,
    AuthenticatedPopulated,
}

impl CartPhase {
    #[must_use]
    pub const fn is_guest(self) -> bool {
        matches!(self, Self::GuestEmpty | Self::GuestPopulated)
    }
}

impl std::fmt::Display for CartPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GuestEmpty => "guest (empty)",
            Self::GuestPopulated => "guest",
            Self::Syncing => "syncing",
            Self::AuthenticatedEmpty => "signed in (empty)",
            Self::AuthenticatedPopulated => "signed in",
        };
        f.write_str(name)
    }
}
