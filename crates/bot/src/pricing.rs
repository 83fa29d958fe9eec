//! Pricing engine.
//!
//! Pure functions from a cart, a delivery choice, a destination and an
//! optional discount rule to a [`Quote`]. Nothing here performs I/O; code
//! lookup is behind [`DiscountValidator`].

use async_trait::async_trait;
use chat_checkout_core::{CurrencyCode, DeliveryType, Money};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::CheckoutError;
use crate::session::CartLine;

/// Shipping rates by destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingPolicy {
    /// State code that gets the home rate (e.g. `TN`).
    pub home_state_code: String,
    /// Full name of the home state, shown when asking for the code.
    pub home_state_name: String,
    pub home_rate: Money,
    pub domestic_rate: Money,
    pub currency: CurrencyCode,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            home_state_code: "TN".to_string(),
            home_state_name: "Tamil Nadu".to_string(),
            home_rate: Money::from_units(40),
            domestic_rate: Money::from_units(80),
            currency: CurrencyCode::INR,
        }
    }
}

impl PricingPolicy {
    /// Only the state code earns the home rate.
    fn is_home_state(&self, state: &str) -> bool {
        state.trim().eq_ignore_ascii_case(self.home_state_code.trim())
    }
}

/// How a discount code reduces the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscountRule {
    /// Percent off the base, e.g. `10` for 10%.
    Percentage { rate: Decimal },
    /// Flat amount off the base.
    Fixed { amount: Money },
}

/// Computed totals for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quote {
    pub subtotal: Money,
    pub shipping: Money,
    pub discount: Money,
    pub grand_total: Money,
}

/// Resolves discount codes against the store.
#[async_trait]
pub trait DiscountValidator: Send + Sync {
    /// `Ok(None)` means the code is unknown or expired.
    async fn resolve(&self, code: &str) -> Result<Option<DiscountRule>, CheckoutError>;
}

/// Sum of unit price times quantity.
#[must_use]
pub fn subtotal(cart: &[CartLine]) -> Money {
    cart.iter().map(|line| line.unit_price * line.quantity).sum()
}

/// Shipping charge. `None` delivery is treated as shipping.
#[must_use]
pub fn shipping(
    delivery: Option<DeliveryType>,
    destination_state: Option<&str>,
    policy: &PricingPolicy,
) -> Money {
    match delivery {
        Some(DeliveryType::Pickup) => Money::ZERO,
        Some(DeliveryType::Ship) | None => match destination_state {
            Some(state) if policy.is_home_state(state) => policy.home_rate,
            _ => policy.domestic_rate,
        },
    }
}

/// Discount on `base`, never more than `base`.
#[must_use]
pub fn discount_amount(rule: Option<&DiscountRule>, base: Money) -> Money {
    let amount = match rule {
        None => return Money::ZERO,
        // Overflow needs a rate above 100%, which is clamped to the base anyway.
        Some(DiscountRule::Percentage { rate }) => (base.amount() / Decimal::ONE_HUNDRED)
            .checked_mul(rate.abs())
            .map_or(base, |amount| {
                Money::new(
                    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
                )
            }),
        Some(DiscountRule::Fixed { amount }) => amount.abs(),
    };
    amount.min(base)
}

/// Full quote for a cart.
#[must_use]
pub fn price(
    cart: &[CartLine],
    delivery: Option<DeliveryType>,
    destination_state: Option<&str>,
    rule: Option<&DiscountRule>,
    policy: &PricingPolicy,
) -> Quote {
    let subtotal = subtotal(cart);
    let shipping = shipping(delivery, destination_state, policy);
    let base = subtotal + shipping;
    let discount = discount_amount(rule, base);

    Quote {
        subtotal,
        shipping,
        discount,
        grand_total: base.saturating_sub(discount),
    }
}
