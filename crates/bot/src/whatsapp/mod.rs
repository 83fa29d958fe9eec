//! WhatsApp Cloud API integration.
//!
//! This module provides:
//! - [`WhatsAppClient`], the [`Messenger`](crate::messaging::Messenger) for
//!   buyer conversations
//! - Webhook payload types and their conversion into conversation events
//! - `X-Hub-Signature-256` verification

mod client;
mod error;
mod types;
mod webhook;

pub use client::WhatsAppClient;
pub use error::WhatsAppError;
pub use types::{Content, OutboundMessage};
pub use webhook::{InboundMessage, WebhookPayload, verify_signature};

pub(crate) use webhook::constant_time_compare;
