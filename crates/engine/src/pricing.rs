//! Pricing engine.
//!
//! [`compute_breakdown`] is a pure function of a [`Cart`] and a
//! [`PricingPolicy`]. Nothing here is cached: the store calls it on every
//! read so totals can never go stale.
//!
//! Lines whose product reference no longer resolves (the server may return
//! stale references to deleted products) contribute nothing to the subtotal
//! or the item count.
//!
//! Amounts that would overflow [`Decimal`] saturate at [`Decimal::MAX`]
//! instead of panicking.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::warn;

use cart_sync_core::{Cart, CurrencyCode, LineItem, Price, Resolution};

/// Tax, shipping and currency rules applied to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Tax rate as a fraction of the subtotal (0.10 = 10%).
    pub tax_rate: Decimal,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Decimal,
    /// Shipping fee charged below the threshold.
    pub flat_shipping: Decimal,
    pub currency: CurrencyCode,
}

impl PricingPolicy {
    pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
    pub const DEFAULT_FREE_SHIPPING_THRESHOLD: Decimal = Decimal::ONE_HUNDRED;
    pub const DEFAULT_FLAT_SHIPPING: Decimal = Decimal::from_parts(15, 0, 0, false, 0);
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Self::DEFAULT_TAX_RATE,
            free_shipping_threshold: Self::DEFAULT_FREE_SHIPPING_THRESHOLD,
            flat_shipping: Self::DEFAULT_FLAT_SHIPPING,
            currency: CurrencyCode::default(),
        }
    }
}

/// Totals derived from a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    /// Units across all lines whose product still resolves.
    pub total_items: u32,
    pub currency: CurrencyCode,
}

impl PricingBreakdown {
    #[must_use]
    pub const fn subtotal_price(&self) -> Price {
        Price::new(self.subtotal, self.currency)
    }

    #[must_use]
    pub const fn tax_price(&self) -> Price {
        Price::new(self.tax, self.currency)
    }

    #[must_use]
    pub const fn shipping_price(&self) -> Price {
        Price::new(self.shipping, self.currency)
    }

    #[must_use]
    pub const fn total_price(&self) -> Price {
        Price::new(self.total, self.currency)
    }

    /// Whether shipping was waived for a non-empty cart.
    #[must_use]
    pub fn has_free_shipping(&self) -> bool {
        self.shipping.is_zero() && !self.subtotal.is_zero()
    }
}

/// Round a monetary amount to cents.
fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Per-unit price of a line after any active discount.
///
/// Returns `None` when the line's product does not resolve.
#[must_use]
pub fn effective_unit_price(line: &LineItem) -> Option<Decimal> {
    match line.resolve() {
        Resolution::Resolved(product) if product.discount.is_active() => {
            Some(product.discounted_price())
        }
        Resolution::Resolved(_) => Some(line.unit_price),
        Resolution::Unresolved(_) => None,
    }
}

fn saturate(amount: Option<Decimal>, what: &'static str) -> Decimal {
    amount.unwrap_or_else(|| {
        warn!(what, "Cart amount overflowed; saturating");
        Decimal::MAX
    })
}

/// Effective unit price times quantity; zero for unresolved lines.
#[must_use]
pub fn line_total(line: &LineItem) -> Decimal {
    effective_unit_price(line).map_or(Decimal::ZERO, |price| {
        saturate(price.checked_mul(Decimal::from(line.quantity)), "line_total")
    })
}

/// Derive the pricing breakdown for a cart.
#[must_use]
pub fn compute_breakdown(cart: &Cart, policy: &PricingPolicy) -> PricingBreakdown {
    let mut subtotal = Decimal::ZERO;
    let mut total_items: u32 = 0;

    for line in cart {
        if let Resolution::Resolved(_) = line.resolve() {
            subtotal = saturate(subtotal.checked_add(line_total(line)), "subtotal");
            total_items = total_items.saturating_add(line.quantity);
        }
    }

    let subtotal = round_money(subtotal);
    let tax = round_money(saturate(subtotal.checked_mul(policy.tax_rate), "tax"));
    let shipping = shipping_for(subtotal, policy);
    let total = saturate(
        subtotal
            .checked_add(tax)
            .and_then(|amount| amount.checked_add(shipping)),
        "total",
    );

    PricingBreakdown {
        subtotal,
        tax,
        shipping,
        total,
        total_items,
        currency: policy.currency,
    }
}

/// Shipping is free for an empty cart and at or above the threshold.
fn shipping_for(subtotal: Decimal, policy: &PricingPolicy) -> Decimal {
    if subtotal.is_zero() || subtotal >= policy.free_shipping_threshold {
        Decimal::ZERO
    } else {
        policy.flat_shipping
    }
}
