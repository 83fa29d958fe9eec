//! Chat Checkout bot library.
//!
//! A WhatsApp conversation that takes a buyer from a catalog cart to a paid
//! Shopify order: cart confirmation, contact and address collection,
//! delivery choice, discount codes, a Razorpay payment link, and order
//! placement when the payment webhook arrives.
//!
//! The conversation logic lives in [`conversation`] and only talks to the
//! outside world through the ports in [`address`], [`pricing`],
//! [`payment`], [`commerce`] and [`messaging`]. The [`whatsapp`],
//! [`shopify`] and [`razorpay`] modules are the production adapters.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod catalog;
pub mod commerce;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod finalizer;
pub mod messaging;
pub mod payment;
pub mod pricing;
pub mod razorpay;
pub mod routes;
pub mod session;
pub mod shopify;
pub mod state;
pub mod whatsapp;
