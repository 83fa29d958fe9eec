//! Status enums for orders and deliveries.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Order fulfillment status.
///
/// Maps to Shopify's REST fulfillment status values, where a missing value
/// means nothing has shipped yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[default]
    Unfulfilled,
    #[serde(alias = "partially_fulfilled")]
    Partial,
    Fulfilled,
    Restocked,
}

impl FulfillmentStatus {
    /// Parse Shopify's nullable `fulfillment_status` field.
    ///
    /// Unknown values are treated as unfulfilled.
    #[must_use]
    pub fn from_shopify(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("fulfilled") => Self::Fulfilled,
            Some("partial" | "partially_fulfilled") => Self::Partial,
            Some("restocked") => Self::Restocked,
            _ => Self::Unfulfilled,
        }
    }

    /// Whether the order still has work pending on the merchant's side.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Unfulfilled | Self::Partial)
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unfulfilled => write!(f, "Not fulfilled yet"),
            Self::Partial => write!(f, "Partially fulfilled"),
            Self::Fulfilled => write!(f, "Fulfilled"),
            Self::Restocked => write!(f, "Restocked"),
        }
    }
}

/// Order financial status.
///
/// Maps to Shopify's REST financial status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FinancialStatus {
    #[default]
    Pending,
    Authorized,
    PartiallyPaid,
    Paid,
    PartiallyRefunded,
    Refunded,
    Voided,
}

impl FinancialStatus {
    /// Parse Shopify's `financial_status` field, defaulting to pending.
    #[must_use]
    pub fn from_shopify(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("authorized") => Self::Authorized,
            Some("partially_paid") => Self::PartiallyPaid,
            Some("paid") => Self::Paid,
            Some("partially_refunded") => Self::PartiallyRefunded,
            Some("refunded") => Self::Refunded,
            Some("voided") => Self::Voided,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for FinancialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Authorized => write!(f, "Authorized"),
            Self::PartiallyPaid => write!(f, "Partially paid"),
            Self::Paid => write!(f, "Paid"),
            Self::PartiallyRefunded => write!(f, "Partially refunded"),
            Self::Refunded => write!(f, "Refunded"),
            Self::Voided => write!(f, "Voided"),
        }
    }
}

/// How the buyer receives the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    /// Courier to the buyer's address.
    Ship,
    /// Collected from the store; no shipping charge.
    Pickup,
}

impl DeliveryType {
    /// Parse a delivery choice from form or button input.
    #[must_use]
    pub fn from_input(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ship" | "ship_to_addr" | "shipping" | "delivery" => Some(Self::Ship),
            "pickup" | "pickup_store" | "store_pickup" => Some(Self::Pickup),
            _ => None,
        }
    }
}

impl fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ship => write!(f, "Ship to address"),
            Self::Pickup => write!(f, "Store pickup"),
        }
    }
}
