//! Background processors.
//!
//! - `NotificationSender`: Receives `OrderEvent`, delivers signed notifications
//! - `PaymentSync`: Receives `ChargeCreated`, reconciles open charges with the
//!   gateway and emits `OrderEvent::PaymentApproved`

pub mod notification_sender;
pub mod payment_sync;

pub use notification_sender::NotificationSender;
pub use payment_sync::PaymentSync;
