//! Orders in the commerce backend.

use async_trait::async_trait;
use chat_checkout_core::{
    CurrencyCode, CustomerId, DeliveryType, FinancialStatus, FulfillmentStatus, Money, OrderName,
    PaymentReference, ProductId,
};
use chrono::{DateTime, Utc};

use crate::address::Address;
use crate::error::CheckoutError;
use crate::session::Session;

/// Who the order is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderCustomer {
    /// Already on file.
    Existing(CustomerId),
    /// Created together with the order.
    New {
        first_name: String,
        email: String,
        phone: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub title: String,
    pub quantity: u32,
    pub price: Money,
}

/// A paid order ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub customer: OrderCustomer,
    pub lines: Vec<OrderLine>,
    pub currency: CurrencyCode,
    /// Amount captured by the payment processor.
    pub total: Money,
    pub shipping: Money,
    pub shipping_title: &'static str,
    pub delivery: DeliveryType,
    pub address: Option<Address>,
    pub contact_name: String,
    /// E.164 phone written on the shipping and billing address.
    pub contact_phone: String,
    pub email: String,
    pub discount: Option<(String, Money)>,
    pub gateway: &'static str,
    /// Marks the order with its payment so redeliveries can find it.
    pub tag: String,
}

impl OrderDraft {
    /// Draft for a paid session. `None` if the session has no cart or totals.
    #[must_use]
    pub fn from_session(
        session: &Session,
        customer: OrderCustomer,
        reference: &PaymentReference,
        dial_code: &str,
        currency: CurrencyCode,
    ) -> Option<Self> {
        let totals = session.totals?;
        if session.cart.is_empty() {
            return None;
        }
        let delivery = session.delivery.unwrap_or(DeliveryType::Ship);

        Some(Self {
            customer,
            lines: session
                .cart
                .iter()
                .map(|line| OrderLine {
                    product_id: line.product_id.clone(),
                    title: line.name.clone(),
                    quantity: line.quantity,
                    price: line.unit_price,
                })
                .collect(),
            currency,
            total: totals.grand_total,
            shipping: totals.shipping,
            shipping_title: match delivery {
                DeliveryType::Ship => "Courier",
                DeliveryType::Pickup => "Store Pickup",
            },
            delivery,
            address: session.address.clone(),
            contact_name: session.customer.name.clone().unwrap_or_default(),
            contact_phone: session
                .customer
                .mobile
                .as_ref()
                .map(|m| m.e164(dial_code))
                .unwrap_or_default(),
            email: session
                .customer
                .email
                .as_ref()
                .map(|e| e.as_str().to_owned())
                .unwrap_or_default(),
            discount: session
                .discount
                .as_ref()
                .filter(|_| totals.discount.is_positive())
                .map(|d| (d.code.clone(), totals.discount)),
            gateway: "razorpay",
            tag: reference.order_tag(),
        })
    }
}

/// An order the backend accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub name: OrderName,
    pub created_at: DateTime<Utc>,
    pub fulfillment_status: FulfillmentStatus,
}

/// Tracking view of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderStatus {
    pub name: OrderName,
    pub financial_status: FinancialStatus,
    pub fulfillment_status: FulfillmentStatus,
}

/// The store's order and customer API.
#[async_trait]
pub trait CommerceBackend: Send + Sync {
    /// Customer id for a phone number in exactly this format.
    async fn find_customer_id(&self, phone: &str) -> Result<Option<CustomerId>, CheckoutError>;

    /// Order carrying `tag`, if one was already placed.
    async fn find_order_by_tag(&self, tag: &str) -> Result<Option<PlacedOrder>, CheckoutError>;

    async fn create_order(&self, draft: &OrderDraft) -> Result<PlacedOrder, CheckoutError>;

    async fn order_status(&self, name: &OrderName) -> Result<Option<OrderStatus>, CheckoutError>;
}
