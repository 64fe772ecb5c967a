//! Notification payloads posted to the store's notification webhook.
//!
//! The receiver (a WhatsApp/email relay) verifies the `Smm-Signature`
//! header with [`crate::signature::verify_notification`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::OrderStatus;
use crate::signature::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderCreated,
    PaymentApproved,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::OrderCreated => write!(f, "order_created"),
            NotificationKind::PaymentApproved => write!(f, "payment_approved"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub event_type: NotificationKind,
    pub order_id: Uuid,
    pub service_id: i64,
    pub quantity: u64,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub customer_whatsapp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    pub timestamp: i64,
}

impl Signature for NotificationPayload {}
