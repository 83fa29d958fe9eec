//! WhatsApp Cloud API errors.

use thiserror::Error;

use crate::error::CheckoutError;

#[derive(Debug, Error)]
pub enum WhatsAppError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Graph API returned an error.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Access token rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the Graph API.
    #[error("rate limited")]
    RateLimited,

    /// `X-Hub-Signature-256` missing or wrong.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

impl From<WhatsAppError> for CheckoutError {
    fn from(err: WhatsAppError) -> Self {
        Self::external("whatsapp", err)
    }
}

/// Error body returned by the Graph API.
#[derive(Debug, serde::Deserialize)]
pub struct GraphErrorResponse {
    pub error: GraphError,
}

#[derive(Debug, serde::Deserialize)]
pub struct GraphError {
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
}
