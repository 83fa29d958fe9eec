//! The checkout conversation.
//!
//! [`transition`] is a pure function from a session and an event to the
//! next session and a list of [`Effect`]s. [`CheckoutService`] runs it:
//! it serializes events per buyer, executes effects, feeds their outcomes
//! back in as events, and persists the result.

pub mod effect;
pub mod event;
pub mod locks;
pub mod replies;
pub mod service;
pub mod transition;

use chat_checkout_core::CurrencyCode;

use crate::pricing::PricingPolicy;

pub use effect::Effect;
pub use event::{CartItem, DiscountOutcome, Event, FormSubmission};
pub use locks::{ConversationGuard, ConversationLocks};
pub use service::{CheckoutPorts, CheckoutService};
pub use transition::{Transition, TransitionContext, transition};

/// Structured checkout form settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSettings {
    /// Button label that opens the form.
    pub cta: String,
    /// First screen of the form.
    pub screen: String,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            cta: "Complete Order".to_string(),
            screen: "CHECKOUT".to_string(),
        }
    }
}

/// Optional features of the messaging channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutCapabilities {
    /// `Some` when the channel can show the checkout form; buyers then fill
    /// in contact and address in one step instead of question by question.
    pub forms: Option<FormSettings>,
}

/// Store-wide conversation settings.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub brand_name: String,
    pub policy: PricingPolicy,
    pub capabilities: CheckoutCapabilities,
    pub dial_code: String,
    pub default_country: String,
    pub currency: CurrencyCode,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            brand_name: "Chat Checkout".to_string(),
            policy: PricingPolicy::default(),
            capabilities: CheckoutCapabilities::default(),
            dial_code: "91".to_string(),
            default_country: "India".to_string(),
            currency: CurrencyCode::INR,
        }
    }
}
