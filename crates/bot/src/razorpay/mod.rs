//! Razorpay payment links.
//!
//! [`RazorpayClient`] is the [`PaymentProcessor`](crate::payment::PaymentProcessor);
//! the webhook types and signature check serve the paid-link callback.

mod client;
mod error;
pub mod types;

pub use client::{RazorpayClient, verify_webhook_signature};
pub use error::RazorpayError;
pub use types::WebhookEvent;
