//! HTTP routes.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health             - Liveness check
//! GET  /health/ready       - Readiness check (database, when configured)
//!
//! # WhatsApp Cloud API
//! GET  /webhook            - Verification handshake
//! POST /webhook            - Inbound messages
//!
//! # Razorpay
//! POST /razorpay-webhook   - Payment link events
//! GET  /razorpay-webhook   - Buyer landing page after paying
//! ```

pub mod razorpay;
pub mod whatsapp;

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::state::AppState;

/// All routes with state attached.
pub fn app(state: AppState) -> Router {
    routes().with_state(state)
}

/// All routes, state still to be provided.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(whatsapp::router())
        .merge(razorpay::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 if a configured database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
