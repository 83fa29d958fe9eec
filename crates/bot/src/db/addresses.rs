//! Saved address rows.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;

use chat_checkout_core::ConversationId;

use super::RepositoryError;
use crate::address::{AddressCache, SavedAddress};

#[derive(Debug, sqlx::FromRow)]
struct SavedAddressRow {
    saved: Json<SavedAddress>,
}

/// `PostgreSQL`-backed [`AddressCache`].
#[derive(Debug, Clone)]
pub struct PgAddressCache {
    pool: PgPool,
}

impl PgAddressCache {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressCache for PgAddressCache {
    #[instrument(skip(self), fields(conversation = %id))]
    async fn get(&self, id: &ConversationId) -> Result<Option<SavedAddress>, RepositoryError> {
        let row = sqlx::query_as::<_, SavedAddressRow>(
            "SELECT saved FROM saved_addresses WHERE conversation_id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.saved.0))
    }

    #[instrument(skip(self, saved), fields(conversation = %id))]
    async fn put(&self, id: &ConversationId, saved: &SavedAddress) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO saved_addresses (conversation_id, saved, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (conversation_id) DO UPDATE
            SET saved = EXCLUDED.saved,
                updated_at = NOW()
            ",
        )
        .bind(id.as_str())
        .bind(Json(saved))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
