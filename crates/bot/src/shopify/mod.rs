//! Shopify Admin API integration.
//!
//! [`ShopifyClient`] is the store's customer directory, discount validator
//! and order backend. It speaks the REST Admin API, plus one GraphQL query
//! to find orders by tag, which REST cannot filter on.

mod client;
pub mod types;

pub use client::ShopifyClient;

use thiserror::Error;

use crate::error::CheckoutError;

/// Errors that can occur when interacting with the Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Non-success status with the response body.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {0}")]
    GraphQL(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<ShopifyError> for CheckoutError {
    fn from(err: ShopifyError) -> Self {
        match err {
            ShopifyError::NotFound(what) => Self::NotFound(what),
            other => Self::external("shopify", other),
        }
    }
}
