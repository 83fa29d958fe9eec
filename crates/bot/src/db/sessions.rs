//! Session rows.
//!
//! The session itself is stored as JSONB. `step` and `payment_reference`
//! are copied into columns so they can be indexed and inspected with SQL.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::{instrument, warn};

use chat_checkout_core::{ConversationId, PaymentReference};

use super::{RepositoryError, map_unique_violation};
use crate::session::{LastOrder, Session, SessionRepository};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    conversation_id: String,
    body: Json<serde_json::Value>,
}

impl SessionRow {
    /// Decode the body. A body that no longer matches the session shape is
    /// dropped so the buyer starts over instead of being stuck.
    fn into_session(self) -> Session {
        match serde_json::from_value(self.body.0) {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    conversation = %self.conversation_id,
                    error = %e,
                    "Discarding undecodable session"
                );
                Session::default()
            }
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    last_order: Json<LastOrder>,
}

// =============================================================================
// Repository
// =============================================================================

/// `PostgreSQL`-backed [`SessionRepository`].
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn last_order(&self, id: &ConversationId) -> Result<Option<LastOrder>, RepositoryError> {
        let row = sqlx::query_as::<_, HistoryRow>(
            r"
            SELECT last_order
            FROM order_history
            WHERE conversation_id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.last_order.0))
    }
}

#[async_trait]
impl SessionRepository for PgSessionStore {
    #[instrument(skip(self), fields(conversation = %id))]
    async fn get_or_create(&self, id: &ConversationId) -> Result<Session, RepositoryError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r"
            SELECT conversation_id, body
            FROM checkout_sessions
            WHERE conversation_id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into_session()),
            None => Ok(Session::with_last_order(self.last_order(id).await?)),
        }
    }

    #[instrument(skip(self, session), fields(conversation = %id, step = %session.step))]
    async fn put(&self, id: &ConversationId, session: &Session) -> Result<(), RepositoryError> {
        let body = serde_json::to_value(session)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO checkout_sessions (conversation_id, step, payment_reference, body, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (conversation_id) DO UPDATE
            SET step = EXCLUDED.step,
                payment_reference = EXCLUDED.payment_reference,
                body = EXCLUDED.body,
                updated_at = NOW()
            ",
        )
        .bind(id.as_str())
        .bind(session.step.name())
        .bind(session.payment_reference.clone())
        .bind(Json(body))
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "payment reference belongs to another conversation"))?;

        Ok(())
    }

    #[instrument(skip(self), fields(conversation = %id))]
    async fn remove(&self, id: &ConversationId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM checkout_sessions WHERE conversation_id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(reference = %reference))]
    async fn find_by_payment_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<(ConversationId, Session)>, RepositoryError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r"
            SELECT conversation_id, body
            FROM checkout_sessions
            WHERE payment_reference = $1
            ",
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let id = ConversationId::from_sender(&row.conversation_id);
            (id, row.into_session())
        }))
    }

    #[instrument(skip(self, order), fields(conversation = %id, order = %order.order_name))]
    async fn record_last_order(
        &self,
        id: &ConversationId,
        order: &LastOrder,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO order_history (conversation_id, last_order, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (conversation_id) DO UPDATE
            SET last_order = EXCLUDED.last_order,
                updated_at = NOW()
            ",
        )
        .bind(id.as_str())
        .bind(Json(order))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            UPDATE checkout_sessions
            SET body = jsonb_set(body, '{last_order}', $2),
                updated_at = NOW()
            WHERE conversation_id = $1
            ",
        )
        .bind(id.as_str())
        .bind(Json(order))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
