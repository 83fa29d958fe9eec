//! Shopify Admin REST payloads.

use chat_checkout_core::{
    CustomerId, FinancialStatus, FulfillmentStatus, Money, OrderName,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::{Address, DirectoryCustomer, RawAddress};
use crate::commerce::{OrderCustomer, OrderDraft, OrderStatus, PlacedOrder};
use crate::pricing::DiscountRule;

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerSearchResponse {
    #[serde(default)]
    pub customers: Vec<CustomerRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerRecord {
    pub id: Value,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub default_address: Option<RawAddress>,
    #[serde(default)]
    pub addresses: Vec<RawAddress>,
}

impl CustomerRecord {
    #[must_use]
    pub fn customer_id(&self) -> CustomerId {
        CustomerId::new(id_text(&self.id))
    }
}

impl From<CustomerRecord> for DirectoryCustomer {
    fn from(record: CustomerRecord) -> Self {
        Self {
            id: record.customer_id(),
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            phone: record.phone,
            default_address: record.default_address,
            addresses: record.addresses,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressesResponse {
    #[serde(default)]
    pub addresses: Vec<RawAddress>,
}

// =============================================================================
// Discounts
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DiscountCodeResponse {
    pub discount_code: Option<DiscountCodeRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscountCodeRecord {
    pub price_rule_id: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceRuleResponse {
    pub price_rule: Option<PriceRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceRule {
    pub value_type: String,
    /// Negative decimal string, e.g. `"-10.0"`.
    pub value: String,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

impl PriceRule {
    /// The rule as a discount, if it is active at `now` and of a kind we
    /// can apply.
    #[must_use]
    pub fn to_discount(&self, now: DateTime<Utc>) -> Option<DiscountRule> {
        if self.starts_at.is_some_and(|start| start > now)
            || self.ends_at.is_some_and(|end| end <= now)
        {
            return None;
        }

        let value = self.value.trim().parse::<Decimal>().ok()?.abs();
        if value.is_zero() {
            return None;
        }

        match self.value_type.as_str() {
            "percentage" => Some(DiscountRule::Percentage { rate: value }),
            "fixed_amount" => Some(DiscountRule::Fixed {
                amount: Money::new(value),
            }),
            _ => None,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub order: NewOrder,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub customer: CustomerRef,
    pub email: String,
    pub phone: String,
    pub line_items: Vec<NewLineItem>,
    pub currency: String,
    pub financial_status: &'static str,
    pub transactions: Vec<NewTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<OrderAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<OrderAddress>,
    pub shipping_lines: Vec<NewShippingLine>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub discount_codes: Vec<NewDiscountCode>,
    pub tags: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CustomerRef {
    Existing {
        id: Value,
    },
    New {
        first_name: String,
        email: String,
        phone: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct NewLineItem {
    pub variant_id: Value,
    pub quantity: u32,
    pub price: Money,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTransaction {
    pub kind: &'static str,
    pub status: &'static str,
    pub amount: Money,
    pub gateway: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderAddress {
    pub address1: String,
    pub city: String,
    pub province: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewShippingLine {
    pub title: &'static str,
    pub code: &'static str,
    pub price: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDiscountCode {
    pub code: String,
    pub amount: Money,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl From<&OrderDraft> for CreateOrderRequest {
    fn from(draft: &OrderDraft) -> Self {
        let address = draft.address.as_ref().map(|a| order_address(a, draft));

        Self {
            order: NewOrder {
                customer: match &draft.customer {
                    OrderCustomer::Existing(id) => CustomerRef::Existing {
                        id: numeric_id(id.as_str()),
                    },
                    OrderCustomer::New {
                        first_name,
                        email,
                        phone,
                    } => CustomerRef::New {
                        first_name: first_name.clone(),
                        email: email.clone(),
                        phone: phone.clone(),
                    },
                },
                email: draft.email.clone(),
                phone: draft.contact_phone.clone(),
                line_items: draft
                    .lines
                    .iter()
                    .map(|line| NewLineItem {
                        variant_id: numeric_id(line.product_id.as_str()),
                        quantity: line.quantity,
                        price: line.price,
                        title: line.title.clone(),
                    })
                    .collect(),
                currency: draft.currency.to_string(),
                financial_status: "paid",
                transactions: vec![NewTransaction {
                    kind: "sale",
                    status: "success",
                    amount: draft.total,
                    gateway: draft.gateway,
                }],
                shipping_address: address.clone(),
                billing_address: address,
                shipping_lines: vec![NewShippingLine {
                    title: draft.shipping_title,
                    code: draft.shipping_title,
                    price: draft.shipping,
                }],
                discount_codes: draft
                    .discount
                    .iter()
                    .map(|(code, amount)| NewDiscountCode {
                        code: code.clone(),
                        amount: *amount,
                        kind: "fixed_amount",
                    })
                    .collect(),
                tags: draft.tag.clone(),
            },
        }
    }
}

fn order_address(address: &Address, draft: &OrderDraft) -> OrderAddress {
    OrderAddress {
        address1: address.line.clone(),
        city: address.city.clone(),
        province: address.state.clone(),
        zip: address.pincode.clone(),
        country: address.country.clone(),
        phone: draft.contact_phone.clone(),
        name: draft.contact_name.clone(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub order: OrderRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersResponse {
    #[serde(default)]
    pub orders: Vec<OrderRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderRecord {
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub financial_status: Option<String>,
    #[serde(default)]
    pub fulfillment_status: Option<String>,
}

impl OrderRecord {
    #[must_use]
    pub fn placed(self) -> PlacedOrder {
        PlacedOrder {
            name: OrderName::new(self.name),
            created_at: self.created_at.unwrap_or_else(Utc::now),
            fulfillment_status: FulfillmentStatus::from_shopify(
                self.fulfillment_status.as_deref(),
            ),
        }
    }

    #[must_use]
    pub fn status(self) -> OrderStatus {
        OrderStatus {
            name: OrderName::new(self.name),
            financial_status: FinancialStatus::from_shopify(self.financial_status.as_deref()),
            fulfillment_status: FulfillmentStatus::from_shopify(
                self.fulfillment_status.as_deref(),
            ),
        }
    }
}

// =============================================================================
// GraphQL order-by-tag lookup
// =============================================================================

pub const ORDER_BY_TAG_QUERY: &str = "query OrderByTag($query: String!) { orders(first: 1, query: $query) { edges { node { name createdAt displayFulfillmentStatus } } } }";

#[derive(Debug, Serialize)]
pub struct GraphQLRequest<'a> {
    pub query: &'static str,
    pub variables: OrderByTagVariables<'a>,
}

#[derive(Debug, Serialize)]
pub struct OrderByTagVariables<'a> {
    pub query: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLErrorMessage>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLErrorMessage {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct OrdersByTagData {
    pub orders: Connection<TaggedOrder>,
}

#[derive(Debug, Deserialize)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedOrder {
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub display_fulfillment_status: Option<String>,
}

impl From<TaggedOrder> for PlacedOrder {
    fn from(order: TaggedOrder) -> Self {
        Self {
            name: OrderName::new(order.name),
            created_at: order.created_at,
            fulfillment_status: FulfillmentStatus::from_shopify(
                order.display_fulfillment_status.as_deref(),
            ),
        }
    }
}

/// Shopify ids are numbers; send them as numbers when they look like one.
fn numeric_id(id: &str) -> Value {
    id.parse::<u64>()
        .map_or_else(|_| Value::String(id.to_string()), Value::from)
}

/// Render an id that may arrive as a number or a string.
#[must_use]
pub fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
