//! Inbound webhook payloads and their signature.

use std::str::FromStr;

use chat_checkout_core::{ConversationId, Money, ProductId};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use super::error::WhatsAppError;
use crate::conversation::{CartItem, Event, FormSubmission};

/// Top-level webhook body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: ChangeValue,
}

/// Messages and delivery statuses; only messages are acted on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextContent>,
    #[serde(default)]
    pub order: Option<OrderContent>,
    #[serde(default)]
    pub interactive: Option<InteractiveContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderContent {
    #[serde(default)]
    pub product_items: Vec<ProductItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductItem {
    pub product_retailer_id: String,
    /// Number or numeric string.
    #[serde(default)]
    pub item_price: Option<Value>,
    #[serde(default)]
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractiveContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub button_reply: Option<ButtonReply>,
    #[serde(default)]
    pub nfm_reply: Option<FormReply>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ButtonReply {
    pub id: String,
}

/// Flow completion. `response_json` is a JSON document inside a string.
#[derive(Debug, Clone, Deserialize)]
pub struct FormReply {
    pub response_json: String,
}

#[derive(Debug, Default, Deserialize)]
struct FormFields {
    name: Option<String>,
    email: Option<String>,
    mobile: Option<Value>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    pincode: Option<Value>,
    delivery_type: Option<String>,
    discount_code: Option<String>,
}

impl WebhookPayload {
    /// Every message in the payload, in delivery order.
    pub fn messages(&self) -> impl Iterator<Item = &InboundMessage> {
        self.entry
            .iter()
            .flat_map(|entry| &entry.changes)
            .flat_map(|change| &change.value.messages)
    }
}

impl InboundMessage {
    #[must_use]
    pub fn sender(&self) -> ConversationId {
        ConversationId::from_sender(&self.from)
    }

    /// The conversation event this message carries, if it is a kind the
    /// checkout understands.
    #[must_use]
    pub fn to_event(&self) -> Option<Event> {
        match self.kind.as_str() {
            "text" => self.text.as_ref().map(|t| Event::from_text(&t.body)),
            "order" => self.order.as_ref().map(|order| {
                Event::CartSubmitted(order.product_items.iter().map(cart_item).collect())
            }),
            "interactive" => {
                let interactive = self.interactive.as_ref()?;
                match interactive.kind.as_str() {
                    "button_reply" => interactive
                        .button_reply
                        .as_ref()
                        .map(|reply| Event::from_button(&reply.id)),
                    "nfm_reply" => interactive
                        .nfm_reply
                        .as_ref()
                        .map(|reply| Event::FormSubmitted(parse_form(&reply.response_json))),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

fn cart_item(item: &ProductItem) -> CartItem {
    CartItem {
        product_id: ProductId::new(item.product_retailer_id.trim()),
        price: item.item_price.as_ref().and_then(decimal).map(Money::new),
        quantity: item.quantity,
    }
}

fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Numbers arrive as strings or JSON numbers depending on the form field.
fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Unreadable form responses become an empty submission, which the
/// conversation answers by asking again.
fn parse_form(response_json: &str) -> FormSubmission {
    let fields: FormFields = serde_json::from_str(response_json).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Unreadable form response");
        FormFields::default()
    });

    FormSubmission {
        name: fields.name,
        email: fields.email,
        mobile: text(fields.mobile),
        address: fields.address,
        city: fields.city,
        state: fields.state,
        pincode: text(fields.pincode),
        delivery_type: fields.delivery_type,
        discount_code: fields.discount_code,
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Check `X-Hub-Signature-256` against the raw body.
///
/// # Errors
///
/// Returns [`WhatsAppError::InvalidSignature`] if the header is malformed or
/// does not match.
pub fn verify_signature(
    app_secret: &SecretString,
    body: &[u8],
    header: &str,
) -> Result<(), WhatsAppError> {
    let Some(signature) = header.strip_prefix("sha256=") else {
        return Err(WhatsAppError::InvalidSignature(
            "Missing sha256= prefix".to_string(),
        ));
    };

    let mut mac = HmacSha256::new_from_slice(app_secret.expose_secret().as_bytes())
        .map_err(|e| WhatsAppError::InvalidSignature(e.to_string()))?;
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if !constant_time_compare(&expected, &signature.to_ascii_lowercase()) {
        return Err(WhatsAppError::InvalidSignature(
            "Signature mismatch".to_string(),
        ));
    }
    Ok(())
}

/// Constant-time string comparison to prevent timing attacks.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
