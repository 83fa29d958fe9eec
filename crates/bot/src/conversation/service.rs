//! Runs the state machine against real collaborators.

use std::collections::VecDeque;
use std::sync::Arc;

use chat_checkout_core::ConversationId;
use tracing::{debug, instrument, warn};

use super::event::{DiscountOutcome, Event};
use super::locks::ConversationLocks;
use super::transition::{Transition, TransitionContext, transition};
use super::{CheckoutSettings, Effect};
use crate::address::AddressResolver;
use crate::catalog::Catalog;
use crate::commerce::CommerceBackend;
use crate::db::RepositoryError;
use crate::messaging::Messenger;
use crate::payment::PaymentInitiator;
use crate::pricing::DiscountValidator;
use crate::session::{Session, SessionRepository};

/// Maximum events processed for one inbound message, outcomes included.
const MAX_EVENTS: usize = 16;

/// Everything the conversation talks to.
#[derive(Clone)]
pub struct CheckoutPorts {
    pub sessions: Arc<dyn SessionRepository>,
    pub messenger: Arc<dyn Messenger>,
    pub addresses: AddressResolver,
    pub discounts: Arc<dyn DiscountValidator>,
    pub payments: PaymentInitiator,
    pub commerce: Arc<dyn CommerceBackend>,
}

struct Inner {
    ports: CheckoutPorts,
    catalog: Catalog,
    settings: CheckoutSettings,
    locks: ConversationLocks,
}

/// Drives one conversation per buyer.
#[derive(Clone)]
pub struct CheckoutService {
    inner: Arc<Inner>,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        ports: CheckoutPorts,
        catalog: Catalog,
        settings: CheckoutSettings,
        locks: ConversationLocks,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ports,
                catalog,
                settings,
                locks,
            }),
        }
    }

    /// Locks shared with anything else that writes sessions.
    #[must_use]
    pub fn locks(&self) -> &ConversationLocks {
        &self.inner.locks
    }

    #[must_use]
    pub fn settings(&self) -> &CheckoutSettings {
        &self.inner.settings
    }

    /// Handle one inbound event for a buyer.
    ///
    /// Loads the session, runs the event and every outcome it leads to,
    /// then saves the session (or removes it if the conversation ended).
    /// Failed sends and collaborator errors are absorbed into the
    /// conversation; only storage failures surface.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be loaded or saved.
    #[instrument(skip(self, event), fields(identity = %id))]
    pub async fn handle(&self, id: &ConversationId, event: Event) -> Result<(), RepositoryError> {
        let inner = &self.inner;
        let _guard = inner.locks.acquire(id).await;

        let mut session = inner.ports.sessions.get_or_create(id).await?;
        let ctx = TransitionContext {
            catalog: &inner.catalog,
            settings: &inner.settings,
        };

        let mut queue = VecDeque::from([event]);
        let mut processed = 0;
        let mut ended = false;

        while let Some(event) = queue.pop_front() {
            processed += 1;
            if processed > MAX_EVENTS {
                warn!(pending = queue.len() + 1, "Event limit reached, dropping outcomes");
                break;
            }

            let from = session.step.name();
            let Transition {
                session: next,
                effects,
            } = transition(session, event, &ctx);
            session = next;
            debug!(from, to = session.step.name(), effects = effects.len(), "Transition");

            for effect in effects {
                match self.run(id, &session, effect).await {
                    Outcome::Event(event) => queue.push_back(event),
                    Outcome::End => ended = true,
                    Outcome::None => {}
                }
            }
        }

        if ended {
            inner.ports.sessions.remove(id).await
        } else {
            inner.ports.sessions.put(id, &session).await
        }
    }

    async fn run(&self, id: &ConversationId, session: &Session, effect: Effect) -> Outcome {
        let ports = &self.inner.ports;

        match effect {
            Effect::Send(reply) => {
                if let Err(e) = ports.messenger.send(id, &reply).await {
                    warn!(error = %e, "Failed to send reply");
                }
                Outcome::None
            }
            Effect::FindExistingAddress => {
                Outcome::Event(Event::ExistingAddress(ports.addresses.find_existing(id).await))
            }
            Effect::SaveAddress(saved) => {
                Outcome::Event(Event::AddressSaved(ports.addresses.save(id, &saved).await))
            }
            Effect::ValidateDiscount(code) => {
                let outcome = match ports.discounts.resolve(&code).await {
                    Ok(Some(rule)) => DiscountOutcome::Valid(rule),
                    Ok(None) => DiscountOutcome::Invalid,
                    Err(e) => {
                        warn!(error = %e, code = %code, "Discount validation failed");
                        DiscountOutcome::Unavailable
                    }
                };
                Outcome::Event(Event::DiscountResolved { code, outcome })
            }
            Effect::RequestPaymentLink => {
                Outcome::Event(match ports.payments.request_payment_link(session).await {
                    Ok(link) => Event::PaymentLinkCreated(link),
                    Err(e) => {
                        warn!(error = %e, "Payment link request failed");
                        Event::PaymentLinkFailed(e)
                    }
                })
            }
            Effect::LookupOrder(name) => {
                let result = ports.commerce.order_status(&name).await;
                if let Err(e) = &result {
                    warn!(error = %e, order = %name, "Order lookup failed");
                }
                Outcome::Event(Event::OrderStatusLoaded { name, result })
            }
            Effect::EndSession => Outcome::End,
        }
    }
}

enum Outcome {
    Event(Event),
    End,
    None,
}
