//! Razorpay payment link and webhook payloads.

use serde::{Deserialize, Serialize};

/// `POST /payment_links` body.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentLink {
    /// Amount in the currency's minor unit (paise).
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub customer: LinkCustomer,
    pub notify: Notify,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_method: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkCustomer {
    pub name: String,
    pub email: String,
    pub contact: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notify {
    pub sms: bool,
    pub email: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentLinkResponse {
    pub id: String,
    pub short_url: String,
}

/// Webhook body. Only `payment_link.paid` carries what we need.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment_link: Option<EntityWrapper<PaymentLinkEntity>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentLinkEntity {
    pub id: String,
    /// Minor units.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub amount_paid: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl WebhookEvent {
    pub const PAYMENT_LINK_PAID: &'static str = "payment_link.paid";

    /// The paid link, when this is a paid-link event.
    #[must_use]
    pub fn paid_link(&self) -> Option<&PaymentLinkEntity> {
        if self.event != Self::PAYMENT_LINK_PAID {
            return None;
        }
        self.payload.payment_link.as_ref().map(|p| &p.entity)
    }
}

impl PaymentLinkEntity {
    /// What was captured, falling back to the link amount.
    #[must_use]
    pub fn paid_minor_units(&self) -> Option<i64> {
        self.amount_paid.filter(|a| *a > 0).or(self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paid_event() {
        let json = r#"{
            "entity": "event",
            "event": "payment_link.paid",
            "payload": {
                "payment_link": {"entity": {"id": "plink_Abc123", "amount": 20000, "amount_paid": 20000, "status": "paid"}},
                "payment": {"entity": {"id": "pay_1"}}
            }
        }"#;
        let event: WebhookEvent = serde_json::from_str(json).expect("deserialize");
        let link = event.paid_link().expect("paid link");
        assert_eq!(link.id, "plink_Abc123");
        assert_eq!(link.paid_minor_units(), Some(20000));
    }

    #[test]
    fn test_other_events_have_no_paid_link() {
        let event: WebhookEvent =
            serde_json::from_str(r#"{"event":"payment.captured","payload":{}}"#)
                .expect("deserialize");
        assert!(event.paid_link().is_none());
    }
}
