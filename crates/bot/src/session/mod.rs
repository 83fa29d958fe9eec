//! Per-conversation checkout state.
//!
//! A [`Session`] is created lazily on the first message from a buyer and is
//! mutated only by the conversation controller and the order finalizer.

pub mod store;

use chat_checkout_core::{
    DeliveryType, Email, FulfillmentStatus, Money, OrderName, PaymentReference, PhoneNumber,
    ProductId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::{Address, SavedAddress};
use crate::pricing::{self, DiscountRule, PricingPolicy, Quote};

pub use store::{InMemorySessionStore, SessionRepository};

/// Where the buyer is in the checkout.
///
/// Steps that need intermediate input carry it, so a half-typed address
/// lives in the step rather than in loose optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Step {
    #[default]
    Start,
    AddressSelection,
    CheckoutForm,
    CollectName,
    CollectEmail,
    CollectMobile,
    CollectAddressLine,
    CollectCity {
        line: String,
    },
    CollectState {
        line: String,
        city: String,
    },
    CollectPincode {
        line: String,
        city: String,
        state: String,
    },
    AddressChoice {
        candidate: Box<SavedAddress>,
    },
    DiscountOffer,
    DiscountInput,
    DiscountRetry,
    DeliveryChoice,
    OrderSummary,
    AwaitingPayment,
    TrackOrder,
    Done,
}

impl Step {
    /// Stable tag, as stored in the `step` column.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AddressSelection => "address_selection",
            Self::CheckoutForm => "checkout_form",
            Self::CollectName => "collect_name",
            Self::CollectEmail => "collect_email",
            Self::CollectMobile => "collect_mobile",
            Self::CollectAddressLine => "collect_address_line",
            Self::CollectCity { .. } => "collect_city",
            Self::CollectState { .. } => "collect_state",
            Self::CollectPincode { .. } => "collect_pincode",
            Self::AddressChoice { .. } => "address_choice",
            Self::DiscountOffer => "discount_offer",
            Self::DiscountInput => "discount_input",
            Self::DiscountRetry => "discount_retry",
            Self::DeliveryChoice => "delivery_choice",
            Self::OrderSummary => "order_summary",
            Self::AwaitingPayment => "awaiting_payment",
            Self::TrackOrder => "track_order",
            Self::Done => "done",
        }
    }

    /// A payment link is out or the order is placed.
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        matches!(self, Self::AwaitingPayment | Self::Done)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One cart line, unique by product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// Buyer contact details, filled in as the conversation goes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Customer {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub mobile: Option<PhoneNumber>,
}

/// A code that validated, and how it applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub code: String,
    pub rule: DiscountRule,
    /// Amount at the time the code was applied; totals recompute it.
    pub amount: Money,
}

/// The most recent order placed from this conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOrder {
    pub order_name: OrderName,
    pub placed_at: DateTime<Utc>,
    pub fulfillment_status: FulfillmentStatus,
}

/// Checkout state for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub step: Step,
    pub cart: Vec<CartLine>,
    pub customer: Customer,
    pub address: Option<Address>,
    pub delivery: Option<DeliveryType>,
    pub discount: Option<AppliedDiscount>,
    pub totals: Option<Quote>,
    pub payment_reference: Option<PaymentReference>,
    pub last_order: Option<LastOrder>,
    /// Failed order placements for the current payment.
    #[serde(default)]
    pub finalize_attempts: u32,
}

impl Session {
    /// Fresh session that remembers the buyer's previous order.
    #[must_use]
    pub fn with_last_order(last_order: Option<LastOrder>) -> Self {
        Self {
            last_order,
            ..Self::default()
        }
    }

    /// Back to `start`, dropping the cart and everything derived from it.
    ///
    /// Contact details and the last order survive.
    pub fn reset(&mut self) {
        *self = Self {
            customer: std::mem::take(&mut self.customer),
            last_order: self.last_order.take(),
            ..Self::default()
        };
    }

    /// Discount code in effect, if any.
    #[must_use]
    pub fn discount_code(&self) -> Option<&str> {
        self.discount.as_ref().map(|d| d.code.as_str())
    }

    /// Totals from the current cart, delivery, destination and discount.
    #[must_use]
    pub fn quote(&self, policy: &PricingPolicy) -> Quote {
        pricing::price(
            &self.cart,
            self.delivery,
            self.address.as_ref().map(|a| a.state.as_str()),
            self.discount.as_ref().map(|d| &d.rule),
            policy,
        )
    }

    /// Recompute and store the totals.
    pub fn recompute_totals(&mut self, policy: &PricingPolicy) -> Quote {
        let quote = self.quote(policy);
        if let Some(discount) = self.discount.as_mut() {
            discount.amount = quote.discount;
        }
        self.totals = Some(quote);
        quote
    }

    /// Whether the last order still awaits fulfillment.
    #[must_use]
    pub fn has_pending_order(&self) -> bool {
        self.last_order
            .as_ref()
            .is_some_and(|o| o.fulfillment_status.is_pending())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn session_with_cart() -> Session {
        Session {
            step: Step::OrderSummary,
            cart: vec![CartLine {
                product_id: ProductId::new("41392567746606"),
                name: "Kungiliyam Bath Soap".to_string(),
                unit_price: Money::from_units(80),
                quantity: 2,
            }],
            customer: Customer {
                name: Some("Asha".to_string()),
                email: Some(Email::parse("asha@example.com").unwrap()),
                mobile: Some(PhoneNumber::parse("9876543210").unwrap()),
            },
            address: Some(Address {
                state: "TN".to_string(),
                ..Address::default()
            }),
            delivery: Some(DeliveryType::Ship),
            payment_reference: Some(PaymentReference::new("plink_1")),
            last_order: Some(LastOrder {
                order_name: OrderName::new("#1001"),
                placed_at: Utc::now(),
                fulfillment_status: FulfillmentStatus::Unfulfilled,
            }),
            ..Session::default()
        }
    }

    #[test]
    fn test_reset_keeps_contact_and_last_order() {
        let mut session = session_with_cart();
        session.reset();

        assert_eq!(session.step, Step::Start);
        assert!(session.cart.is_empty());
        assert!(session.address.is_none());
        assert!(session.delivery.is_none());
        assert!(session.payment_reference.is_none());
        assert_eq!(session.customer.name.as_deref(), Some("Asha"));
        assert!(session.last_order.is_some());
    }

    #[test]
    fn test_quote_uses_address_state() {
        let session = session_with_cart();
        let quote = session.quote(&PricingPolicy::default());
        assert_eq!(quote.shipping, Money::from_units(40));
        assert_eq!(quote.grand_total, Money::from_units(200));
    }

    #[test]
    fn test_step_serializes_with_payload() {
        let mut session = Session::default();
        session.step = Step::CollectState {
            line: "No 1, Anna Street".to_string(),
            city: "Chennai".to_string(),
        };

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["step"]["name"], "collect_state");
        assert_eq!(json["step"]["city"], "Chennai");

        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back.step, session.step);
    }

    #[test]
    fn test_step_flags() {
        assert!(Step::AwaitingPayment.is_processing());
        assert!(!Step::OrderSummary.is_processing());
    }

    #[test]
    fn test_pending_order() {
        let mut session = session_with_cart();
        assert!(session.has_pending_order());
        if let Some(order) = session.last_order.as_mut() {
            order.fulfillment_status = FulfillmentStatus::Fulfilled;
        }
        assert!(!session.has_pending_order());
    }
}
