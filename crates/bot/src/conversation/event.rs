//! Inputs to the conversation state machine.

use chat_checkout_core::{Money, OrderName, ProductId};

use crate::address::SavedAddress;
use crate::commerce::OrderStatus;
use crate::error::CheckoutError;
use crate::messaging::ButtonId;
use crate::payment::{PaymentError, PaymentLink};
use crate::pricing::DiscountRule;

/// One line of a submitted cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: ProductId,
    /// Price quoted by the gateway, if it sent one.
    pub price: Option<Money>,
    pub quantity: Option<u32>,
}

/// Fields of the structured checkout form. Every field is optional on the
/// wire; validation happens in the transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub delivery_type: Option<String>,
    pub discount_code: Option<String>,
}

/// Result of checking a discount code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountOutcome {
    Valid(DiscountRule),
    /// Unknown or expired.
    Invalid,
    /// The validator could not be reached.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // From the buyer
    Greeting,
    CartSubmitted(Vec<CartItem>),
    Button(ButtonId),
    UnknownButton(String),
    Text(String),
    FormSubmitted(FormSubmission),

    // Outcomes of effects, fed back by the executor
    ExistingAddress(Option<SavedAddress>),
    AddressSaved(bool),
    DiscountResolved {
        code: String,
        outcome: DiscountOutcome,
    },
    PaymentLinkCreated(PaymentLink),
    PaymentLinkFailed(PaymentError),
    OrderStatusLoaded {
        name: OrderName,
        result: Result<Option<OrderStatus>, CheckoutError>,
    },
}

impl Event {
    /// Classify a text message: greetings reset, anything else is text.
    #[must_use]
    pub fn from_text(body: &str) -> Self {
        if is_greeting(body) {
            Self::Greeting
        } else {
            Self::Text(body.trim().to_string())
        }
    }

    /// Classify a button reply.
    #[must_use]
    pub fn from_button(id: &str) -> Self {
        ButtonId::parse(id).map_or_else(|| Self::UnknownButton(id.to_string()), Self::Button)
    }
}

/// `hi`, `hello` or `start`, any case.
#[must_use]
pub fn is_greeting(text: &str) -> bool {
    let text = text.trim();
    ["hi", "hello", "start"]
        .iter()
        .any(|greeting| text.eq_ignore_ascii_case(greeting))
}
