//! Error handling for the bot.
//!
//! [`CheckoutError`] is what the conversation sees from its collaborators;
//! [`AppError`] is what the HTTP edge turns into a status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;

/// Failure classes the checkout conversation distinguishes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Required input missing or malformed before an external call.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A directory, processor, backend or messaging call failed.
    #[error("{service} error: {message}")]
    ExternalService {
        service: &'static str,
        message: String,
    },

    /// Nothing matched a lookup.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The action is already in flight for this conversation.
    #[error("Duplicate submission: {0}")]
    DuplicateSubmission(String),
}

impl CheckoutError {
    /// Shorthand for an [`CheckoutError::ExternalService`] error.
    pub fn external(service: &'static str, message: impl ToString) -> Self {
        Self::ExternalService {
            service,
            message: message.to_string(),
        }
    }
}

/// Application-level error type for HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Session or address storage failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// An external service failed while handling a webhook.
    #[error("Upstream error: {0}")]
    Upstream(#[from] CheckoutError),

    /// Signature or verify token mismatch.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Verification handshake rejected.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed payload.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Internal(_) | Self::Upstream(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Webhook request error"
            );
        }

        let status = match &self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Upstream(_) => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}
