//! Order events passed between the API and the background processors.
//!
//! # Event Flow
//!
//! 1. `POST /orders` emits `OrderEvent::Created` -> `NotificationSender`
//! 2. `POST /payments` emits `ChargeCreated` -> `PaymentSync`
//! 3. `PaymentSync` emits `OrderEvent::PaymentApproved` -> `NotificationSender`
//!
//! Events carry identifiers only; processors re-fetch the order from the database.

pub mod channels;
pub mod types;

pub use channels::{
    ChargeCreatedReceiver, ChargeCreatedSender, DEFAULT_CHANNEL_BUFFER, EventSenders,
    OrderEventReceiver, OrderEventSender, charge_created_channel, order_event_channel,
};

pub use types::{ChargeCreated, OrderEvent};
