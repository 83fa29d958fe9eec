//! Session repository.
//!
//! Sessions are keyed by conversation id with a secondary index from
//! payment reference to conversation, so the payment webhook can find the
//! session it belongs to without scanning.

use std::collections::HashMap;

use async_trait::async_trait;
use chat_checkout_core::{ConversationId, PaymentReference};
use tokio::sync::RwLock;

use super::{LastOrder, Session};
use crate::db::RepositoryError;

/// Storage for checkout sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// The stored session, or a fresh one seeded with the buyer's last order.
    async fn get_or_create(&self, id: &ConversationId) -> Result<Session, RepositoryError>;

    /// Write a session and keep the payment reference index in step.
    ///
    /// Fails with [`RepositoryError::Conflict`] if another conversation
    /// already holds the session's payment reference.
    async fn put(&self, id: &ConversationId, session: &Session) -> Result<(), RepositoryError>;

    /// Delete a session and its index entry. Removing a missing session is
    /// not an error.
    async fn remove(&self, id: &ConversationId) -> Result<(), RepositoryError>;

    /// The session holding `reference`, if any.
    async fn find_by_payment_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<(ConversationId, Session)>, RepositoryError>;

    /// Remember the buyer's latest order beyond the session's lifetime.
    async fn record_last_order(
        &self,
        id: &ConversationId,
        order: &LastOrder,
    ) -> Result<(), RepositoryError>;
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<ConversationId, Session>,
    by_reference: HashMap<PaymentReference, ConversationId>,
    history: HashMap<ConversationId, LastOrder>,
}

/// Process-local session store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: RwLock<Inner>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.sessions.is_empty()
    }

    /// Peek at a session without creating it.
    pub async fn get(&self, id: &ConversationId) -> Option<Session> {
        self.inner.read().await.sessions.get(id).cloned()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionStore {
    async fn get_or_create(&self, id: &ConversationId) -> Result<Session, RepositoryError> {
        let mut inner = self.inner.write().await;
        let last_order = inner.history.get(id).cloned();
        Ok(inner
            .sessions
            .entry(id.clone())
            .or_insert_with(|| Session::with_last_order(last_order))
            .clone())
    }

    async fn put(&self, id: &ConversationId, session: &Session) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;

        if let Some(reference) = &session.payment_reference
            && let Some(owner) = inner.by_reference.get(reference)
            && owner != id
        {
            return Err(RepositoryError::Conflict(format!(
                "payment reference {reference} belongs to another conversation"
            )));
        }

        let previous = inner
            .sessions
            .insert(id.clone(), session.clone())
            .and_then(|old| old.payment_reference);
        if let Some(old) = previous
            && session.payment_reference.as_ref() != Some(&old)
        {
            inner.by_reference.remove(&old);
        }
        if let Some(reference) = &session.payment_reference {
            inner.by_reference.insert(reference.clone(), id.clone());
        }
        Ok(())
    }

    async fn remove(&self, id: &ConversationId) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        if let Some(reference) = inner
            .sessions
            .remove(id)
            .and_then(|session| session.payment_reference)
        {
            inner.by_reference.remove(&reference);
        }
        Ok(())
    }

    async fn find_by_payment_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<(ConversationId, Session)>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.by_reference.get(reference).and_then(|id| {
            inner
                .sessions
                .get(id)
                .map(|session| (id.clone(), session.clone()))
        }))
    }

    async fn record_last_order(
        &self,
        id: &ConversationId,
        order: &LastOrder,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        inner.history.insert(id.clone(), order.clone());
        if let Some(session) = inner.sessions.get_mut(id) {
            session.last_order = Some(order.clone());
        }
        Ok(())
    }
}
