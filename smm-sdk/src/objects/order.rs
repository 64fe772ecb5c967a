//! Order drafts, persisted orders and status reports.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `smm-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Processing,
    Completed,
    Cancelled,
    Refunded,
    Partial,
}

impl OrderStatus {
    /// Statuses that can only be reached after the payment was confirmed.
    pub fn implies_payment(self) -> bool {
        matches!(self, OrderStatus::Processing | OrderStatus::Completed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::PendingPayment => write!(f, "pending_payment"),
            OrderStatus::Processing => write!(f, "processing"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
            OrderStatus::Refunded => write!(f, "refunded"),
            OrderStatus::Partial => write!(f, "partial"),
        }
    }
}

/// Gradual delivery settings. Present on a draft only when drip feed is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DripFeed {
    pub daily_quantity: u64,
}

/// Checkout form state held by the client until submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub target_url: String,
    /// Requested quantity; `0` means the customer has not entered one yet.
    pub quantity: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    pub customer_whatsapp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub is_express: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drip_feed: Option<DripFeed>,
}

impl OrderDraft {
    /// The coupon code with surrounding whitespace removed, if any is left.
    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// Request body for `POST /api/v1/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub service_id: i64,
    #[serde(flatten)]
    pub draft: OrderDraft,
}

/// A persisted order as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub service_id: i64,
    pub target_url: String,
    pub quantity: u64,
    pub is_express: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drip_feed: Option<DripFeed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
    pub status: OrderStatus,
    /// Unix timestamp of when the order was created.
    pub created_at: i64,
}

/// Response of the order-status check used by the payment poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusReport {
    pub payment_approved: bool,
    pub status: OrderStatus,
}

impl OrderStatusReport {
    /// Payment counts as confirmed when the flag is set or the order has
    /// already moved on to fulfillment.
    pub fn is_approved(&self) -> bool {
        self.payment_approved || self.status.implies_payment()
    }
}
