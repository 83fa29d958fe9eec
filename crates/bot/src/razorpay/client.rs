//! Razorpay API client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chat_checkout_core::PaymentReference;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::{debug, instrument};

use super::error::{ApiErrorResponse, RazorpayError};
use super::types::{CreatePaymentLink, LinkCustomer, Notify, PaymentLinkResponse};
use crate::config::RazorpayConfig;
use crate::error::CheckoutError;
use crate::payment::{PaymentLink, PaymentProcessor, PaymentRequest};
use crate::whatsapp::constant_time_compare;

type HmacSha256 = Hmac<Sha256>;

/// Razorpay payment link client.
#[derive(Clone)]
pub struct RazorpayClient {
    inner: Arc<RazorpayClientInner>,
}

struct RazorpayClientInner {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
    callback_url: Option<String>,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("api_base", &self.inner.api_base)
            .field("key_id", &self.inner.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &RazorpayConfig, timeout: Duration) -> Result<Self, RazorpayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(RazorpayClientInner {
                client,
                api_base: config.api_base.trim_end_matches('/').to_string(),
                key_id: config.key_id.clone(),
                key_secret: config.key_secret.clone(),
                callback_url: config.callback_url.clone(),
            }),
        })
    }

    /// Create a payment link.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount has sub-paise precision, the request
    /// fails, or Razorpay rejects it.
    #[instrument(skip(self, request), fields(amount = %request.amount))]
    pub async fn create_link(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentLinkResponse, RazorpayError> {
        let amount = request
            .amount
            .to_minor_units()
            .ok_or_else(|| RazorpayError::InvalidAmount(request.amount.to_string()))?;

        let body = CreatePaymentLink {
            amount,
            currency: request.currency.to_string(),
            description: request.description.clone(),
            customer: LinkCustomer {
                name: request.customer_name.clone(),
                email: request.email.as_str().to_string(),
                contact: request.contact.clone(),
            },
            notify: Notify {
                sms: false,
                email: false,
            },
            callback_method: self.inner.callback_url.as_ref().map(|_| "get"),
            callback_url: self.inner.callback_url.clone(),
        };

        let response = self
            .inner
            .client
            .post(format!("{}/payment_links", self.inner.api_base))
            .basic_auth(&self.inner.key_id, Some(self.inner.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let link: PaymentLinkResponse = response.json().await?;
            debug!(id = %link.id, "Payment link created");
            return Ok(link);
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(RazorpayError::Unauthorized(
                "Invalid key id or secret".to_string(),
            ));
        }

        let text = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<ApiErrorResponse>(&text) {
            Ok(e) => RazorpayError::Api {
                status: status.as_u16(),
                code: e.error.code,
                description: e.error.description,
            },
            Err(_) => RazorpayError::Api {
                status: status.as_u16(),
                code: "UNKNOWN".to_string(),
                description: text,
            },
        })
    }
}

#[async_trait]
impl PaymentProcessor for RazorpayClient {
    async fn create_payment_link(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentLink, CheckoutError> {
        let link = self.create_link(request).await?;
        Ok(PaymentLink {
            reference: PaymentReference::new(link.id),
            url: link.short_url,
        })
    }
}

/// Check `X-Razorpay-Signature`: hex HMAC-SHA256 of the raw body.
///
/// # Errors
///
/// Returns [`RazorpayError::InvalidSignature`] on mismatch.
pub fn verify_webhook_signature(
    secret: &SecretString,
    body: &[u8],
    signature: &str,
) -> Result<(), RazorpayError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| RazorpayError::InvalidSignature(e.to_string()))?;
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if !constant_time_compare(&expected, signature.trim()) {
        return Err(RazorpayError::InvalidSignature(
            "Signature mismatch".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_signature() {
        let secret = SecretString::from("whsec-razorpay-test");
        let body = br#"{"event":"payment_link.paid"}"#;
        let mut mac = HmacSha256::new_from_slice(b"whsec-razorpay-test").unwrap();
        mac.update(body);
        let signature = hex::encode(mac.finalize().into_bytes());

        assert!(verify_webhook_signature(&secret, body, &signature).is_ok());
        assert!(verify_webhook_signature(&secret, b"{}", &signature).is_err());
        assert!(verify_webhook_signature(&secret, body, "").is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = RazorpayConfig {
            api_base: "https://api.razorpay.com/v1".to_string(),
            key_id: "rzp_test_123".to_string(),
            key_secret: SecretString::from("super-secret-key"),
            webhook_secret: None,
            callback_url: None,
        };
        let client = RazorpayClient::new(&config, Duration::from_secs(5)).unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("rzp_test_123"));
        assert!(!debug.contains("super-secret-key"));
    }
}
