//! Razorpay errors.

use thiserror::Error;

use crate::error::CheckoutError;

#[derive(Debug, Error)]
pub enum RazorpayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Razorpay rejected the request.
    #[error("API error ({status}): {code}: {description}")]
    Api {
        status: u16,
        code: String,
        description: String,
    },

    /// Key id or secret rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Amount cannot be expressed in the currency's minor unit.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// `X-Razorpay-Signature` missing or wrong.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

impl From<RazorpayError> for CheckoutError {
    fn from(err: RazorpayError) -> Self {
        match err {
            RazorpayError::InvalidAmount(msg) => Self::Validation(msg),
            other => Self::external("razorpay", other),
        }
    }
}

/// Error body returned by the Razorpay API.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, serde::Deserialize)]
pub struct ApiError {
    pub code: String,
    #[serde(default)]
    pub description: String,
}
