//! Payment link creation.

use std::sync::Arc;

use async_trait::async_trait;
use chat_checkout_core::{CurrencyCode, Email, Money, PaymentReference};
use thiserror::Error;
use tracing::instrument;

use crate::error::CheckoutError;
use crate::session::Session;

/// What the processor needs to issue a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub amount: Money,
    pub currency: CurrencyCode,
    pub description: String,
    pub customer_name: String,
    pub email: Email,
    /// Mobile in E.164 form.
    pub contact: String,
}

/// A shareable payment link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLink {
    pub reference: PaymentReference,
    pub url: String,
}

/// Issues payment links.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_payment_link(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentLink, CheckoutError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Contact details or a payable total are missing.
    #[error("missing checkout information: {}", .0.join(", "))]
    MissingInfo(Vec<&'static str>),

    /// The session already has a link out.
    #[error("payment link {0} already issued")]
    AlreadyRequested(PaymentReference),

    #[error(transparent)]
    Processor(#[from] CheckoutError),
}

/// Build the processor request, or say what is missing.
///
/// # Errors
///
/// [`PaymentError::AlreadyRequested`] when the session holds a reference,
/// [`PaymentError::MissingInfo`] when name, email, mobile or a positive
/// grand total is absent.
pub fn check_ready(
    session: &Session,
    dial_code: &str,
    currency: CurrencyCode,
) -> Result<PaymentRequest, PaymentError> {
    if let Some(reference) = &session.payment_reference {
        return Err(PaymentError::AlreadyRequested(reference.clone()));
    }

    let name = session
        .customer
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let email = session.customer.email.as_ref();
    let mobile = session.customer.mobile.as_ref();
    let total = session
        .totals
        .map(|t| t.grand_total)
        .filter(Money::is_positive);

    match (name, email, mobile, total) {
        (Some(name), Some(email), Some(mobile), Some(amount)) => Ok(PaymentRequest {
            amount,
            currency,
            description: format!("Order for {name}"),
            customer_name: name.to_string(),
            email: email.clone(),
            contact: mobile.e164(dial_code),
        }),
        _ => {
            let mut missing = Vec::new();
            if name.is_none() {
                missing.push("name");
            }
            if email.is_none() {
                missing.push("email");
            }
            if mobile.is_none() {
                missing.push("mobile");
            }
            if total.is_none() {
                missing.push("total");
            }
            Err(PaymentError::MissingInfo(missing))
        }
    }
}

/// Checks preconditions, then asks the processor for a link.
#[derive(Clone)]
pub struct PaymentInitiator {
    processor: Arc<dyn PaymentProcessor>,
    dial_code: String,
    currency: CurrencyCode,
}

impl PaymentInitiator {
    #[must_use]
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        dial_code: impl Into<String>,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            processor,
            dial_code: dial_code.into(),
            currency,
        }
    }

    /// Request a link for the session's grand total.
    ///
    /// The processor is not contacted when preconditions fail.
    ///
    /// # Errors
    ///
    /// See [`check_ready`]; processor failures are
    /// [`PaymentError::Processor`].
    #[instrument(skip(self, session), fields(step = %session.step))]
    pub async fn request_payment_link(
        &self,
        session: &Session,
    ) -> Result<PaymentLink, PaymentError> {
        let request = check_ready(session, &self.dial_code, self.currency)?;
        let link = self.processor.create_payment_link(&request).await?;
        tracing::info!(reference = %link.reference, amount = %request.amount, "Payment link created");
        Ok(link)
    }
}
