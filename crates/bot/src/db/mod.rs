//! `PostgreSQL` storage for sessions and saved addresses.
//!
//! # Tables
//!
//! - `checkout_sessions` - One row per live conversation (JSONB body),
//!   with a unique `payment_reference` column as the webhook index
//! - `order_history` - Last order per buyer, kept after sessions end
//! - `saved_addresses` - Address cache keyed by conversation
//!
//! # Migrations
//!
//! Migrations are stored in `crates/bot/migrations/` and run via:
//! ```bash
//! cargo run -p chat-checkout-cli -- migrate
//! ```

pub mod addresses;
pub mod sessions;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::PgAddressCache;
pub use sessions::PgSessionStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., payment reference already indexed).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique violation to [`RepositoryError::Conflict`].
pub(crate) fn map_unique_violation(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err
        && db.is_unique_violation()
    {
        return RepositoryError::Conflict(what.to_string());
    }
    RepositoryError::Database(err)
}
