//! Chat Checkout Core - Shared domain types.
//!
//! This crate provides the types shared by every chat checkout component:
//! - `bot` - WhatsApp webhook service driving the checkout conversation
//! - `cli` - Command-line tools for migrations and catalog checks
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for identifiers, money, phone numbers, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
