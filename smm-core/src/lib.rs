#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod backend;
pub mod checkout;
pub mod config;
pub mod coupons;
pub mod entities;
pub mod events;
pub mod framework;
pub mod gateway;
pub mod poller;
pub mod pricing;
pub mod processors;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod utils;
