//! Turns a paid payment link into an order.
//!
//! Driven by the payment webhook. Processors deliver at least once, so every
//! step here must tolerate running again for the same payment: the order is
//! tagged with its payment reference and looked up by that tag before
//! anything is created.

use std::sync::Arc;

use chat_checkout_core::{ConversationId, CurrencyCode, Money, OrderName, PaymentReference};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::commerce::{CommerceBackend, OrderCustomer, OrderDraft, PlacedOrder};
use crate::conversation::{ConversationLocks, replies};
use crate::db::RepositoryError;
use crate::error::AppError;
use crate::messaging::Messenger;
use crate::session::{LastOrder, Session, SessionRepository, Step};

/// What happened to a payment notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// No session holds the reference, or it cannot be turned into an order.
    Ignored,
    /// A new order was created.
    Placed(OrderName),
    /// An order for this payment already existed.
    AlreadyPlaced(OrderName),
    /// The backend refused or was unreachable; the session is kept for the
    /// next delivery.
    Failed { attempts: u32 },
}

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("session storage failed: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<FinalizeError> for AppError {
    fn from(err: FinalizeError) -> Self {
        match err {
            FinalizeError::Repository(e) => Self::Database(e),
        }
    }
}

/// Places orders for paid sessions.
#[derive(Clone)]
pub struct OrderFinalizer {
    sessions: Arc<dyn SessionRepository>,
    commerce: Arc<dyn CommerceBackend>,
    messenger: Arc<dyn Messenger>,
    locks: ConversationLocks,
    dial_code: String,
    currency: CurrencyCode,
}

impl OrderFinalizer {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        commerce: Arc<dyn CommerceBackend>,
        messenger: Arc<dyn Messenger>,
        locks: ConversationLocks,
        dial_code: impl Into<String>,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            sessions,
            commerce,
            messenger,
            locks,
            dial_code: dial_code.into(),
            currency,
        }
    }

    /// Place the order for a paid payment link.
    ///
    /// `paid_amount` is what the processor reports as captured; a mismatch
    /// with the session's grand total is logged but does not stop the order.
    ///
    /// # Errors
    ///
    /// Returns an error only if session storage fails. Backend failures are
    /// reported as [`FinalizeOutcome::Failed`].
    #[instrument(skip(self), fields(reference = %reference))]
    pub async fn finalize(
        &self,
        reference: &PaymentReference,
        paid_amount: Option<Money>,
    ) -> Result<FinalizeOutcome, FinalizeError> {
        let Some((id, _)) = self.sessions.find_by_payment_reference(reference).await? else {
            info!("No session for payment reference");
            return Ok(FinalizeOutcome::Ignored);
        };

        let _guard = self.locks.acquire(&id).await;

        // The conversation may have moved on while we waited.
        let Some((id, mut session)) = self.sessions.find_by_payment_reference(reference).await?
        else {
            info!("Session released the payment reference");
            return Ok(FinalizeOutcome::Ignored);
        };

        match self.commerce.find_order_by_tag(&reference.order_tag()).await {
            Ok(Some(order)) => {
                info!(order = %order.name, "Order already placed for payment");
                let name = order.name.clone();
                self.complete(&id, &mut session, order).await?;
                return Ok(FinalizeOutcome::AlreadyPlaced(name));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Order tag lookup failed");
                return self.fail(&id, &mut session).await;
            }
        }

        if let Some(paid) = paid_amount {
            check_amount(&session, paid);
        }

        let customer = self.resolve_customer(&id, &session).await;
        let Some(draft) =
            OrderDraft::from_session(&session, customer, reference, &self.dial_code, self.currency)
        else {
            error!(step = %session.step, "Paid session has no cart or totals");
            return Ok(FinalizeOutcome::Ignored);
        };

        match self.commerce.create_order(&draft).await {
            Ok(order) => {
                info!(order = %order.name, total = %draft.total, "Order placed");
                let name = order.name.clone();
                self.complete(&id, &mut session, order).await?;
                Ok(FinalizeOutcome::Placed(name))
            }
            Err(e) => {
                error!(error = %e, "Order creation failed");
                self.fail(&id, &mut session).await
            }
        }
    }

    /// Existing customer by any phone format, else a new one from the
    /// session's contact details.
    async fn resolve_customer(&self, id: &ConversationId, session: &Session) -> OrderCustomer {
        let phone = session.customer.mobile.clone().or_else(|| id.phone());

        if let Some(phone) = &phone {
            for variant in phone.lookup_variants(&self.dial_code) {
                match self.commerce.find_customer_id(&variant).await {
                    Ok(Some(customer_id)) => return OrderCustomer::Existing(customer_id),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "Customer lookup failed, creating inline");
                        break;
                    }
                }
            }
        }

        OrderCustomer::New {
            first_name: session.customer.name.clone().unwrap_or_default(),
            email: session
                .customer
                .email
                .as_ref()
                .map(|e| e.as_str().to_owned())
                .unwrap_or_default(),
            phone: phone
                .map(|p| p.e164(&self.dial_code))
                .unwrap_or_default(),
        }
    }

    async fn complete(
        &self,
        id: &ConversationId,
        session: &mut Session,
        order: PlacedOrder,
    ) -> Result<(), FinalizeError> {
        let last = LastOrder {
            order_name: order.name,
            placed_at: order.created_at,
            fulfillment_status: order.fulfillment_status,
        };
        self.sessions.record_last_order(id, &last).await?;

        session.step = Step::Done;
        session.last_order = Some(last.clone());
        if let Err(e) = self
            .messenger
            .send(id, &replies::order_placed(&last.order_name))
            .await
        {
            warn!(error = %e, "Failed to send order confirmation");
        }

        self.sessions.remove(id).await?;
        Ok(())
    }

    async fn fail(
        &self,
        id: &ConversationId,
        session: &mut Session,
    ) -> Result<FinalizeOutcome, FinalizeError> {
        session.finalize_attempts = session.finalize_attempts.saturating_add(1);
        let attempts = session.finalize_attempts;

        if attempts == 1
            && let Err(e) = self.messenger.send(id, &replies::order_failed()).await
        {
            warn!(error = %e, "Failed to send order failure notice");
        }

        self.sessions.put(id, session).await?;
        Ok(FinalizeOutcome::Failed { attempts })
    }
}

fn check_amount(session: &Session, paid: Money) {
    let expected = session.totals.map(|t| t.grand_total);
    let matches = expected
        .and_then(|e| e.to_minor_units())
        .zip(paid.to_minor_units())
        .is_some_and(|(e, p)| e == p);

    if !matches {
        warn!(
            paid = %paid,
            expected = ?expected.map(|e| e.to_string()),
            "Paid amount does not match the order total"
        );
    }
}
