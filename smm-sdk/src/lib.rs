//! Shared types for the SMM storefront checkout.
//!
//! The `objects` module holds every request/response body exchanged between
//! the storefront frontend, the checkout server and notification receivers.
//! Enable the `client` feature for a typed HTTP client.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod signature;
