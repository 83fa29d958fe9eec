//! Outbound message primitives.
//!
//! The conversation speaks in [`Reply`] values; a [`Messenger`] turns them
//! into whatever the gateway wants on the wire.

use async_trait::async_trait;
use chat_checkout_core::ConversationId;
use serde_json::Value;

use crate::error::CheckoutError;

/// Reply-button ids the bot sends and understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    Catalog,
    Track,
    UseExisting,
    EnterNew,
    UseSaved,
    UseNew,
    ApplyDiscount,
    SkipDiscount,
    RetryDiscount,
    Ship,
    Pickup,
    ConfirmPayment,
    CancelOrder,
}

impl ButtonId {
    /// Id sent on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Track => "track",
            Self::UseExisting => "use_existing",
            Self::EnterNew => "enter_new",
            Self::UseSaved => "use_saved_addr",
            Self::UseNew => "use_new_addr",
            Self::ApplyDiscount => "apply_discount",
            Self::SkipDiscount => "skip_discount",
            Self::RetryDiscount => "retry_discount",
            Self::Ship => "ship_to_addr",
            Self::Pickup => "pickup_store",
            Self::ConfirmPayment => "confirm_payment",
            Self::CancelOrder => "cancel_order",
        }
    }

    /// Parse an id from a button reply.
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        Some(match id {
            "catalog" => Self::Catalog,
            "track" => Self::Track,
            "use_existing" => Self::UseExisting,
            "enter_new" => Self::EnterNew,
            "use_saved_addr" => Self::UseSaved,
            "use_new_addr" => Self::UseNew,
            "apply_discount" => Self::ApplyDiscount,
            // older messages used a separate id after a saved address
            "skip_discount" | "skip_discount_saved" => Self::SkipDiscount,
            "retry_discount" => Self::RetryDiscount,
            "ship_to_addr" => Self::Ship,
            "pickup_store" => Self::Pickup,
            "confirm_payment" => Self::ConfirmPayment,
            "cancel_order" => Self::CancelOrder,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ButtonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub id: ButtonId,
    pub title: String,
}

impl Button {
    pub fn new(id: ButtonId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    /// Two or three reply buttons.
    Buttons {
        header: Option<String>,
        body: String,
        footer: Option<String>,
        buttons: Vec<Button>,
    },
    /// Structured checkout form.
    Form {
        header: String,
        body: String,
        cta: String,
        screen: String,
        data: Value,
    },
    /// Product catalog browser.
    Catalog { body: String, footer: Option<String> },
}

impl Reply {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text(body.into())
    }

    /// Main text of the message, for logs and tests.
    #[must_use]
    pub fn body(&self) -> &str {
        match self {
            Self::Text(body)
            | Self::Buttons { body, .. }
            | Self::Form { body, .. }
            | Self::Catalog { body, .. } => body,
        }
    }

    /// Button ids offered, in order.
    #[must_use]
    pub fn button_ids(&self) -> Vec<ButtonId> {
        match self {
            Self::Buttons { buttons, .. } => buttons.iter().map(|b| b.id).collect(),
            _ => Vec::new(),
        }
    }
}

/// Delivers replies to buyers.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, to: &ConversationId, reply: &Reply) -> Result<(), CheckoutError>;
}
