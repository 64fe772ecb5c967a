//! Payment creation types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Brazilian instant bank transfer, paid by scanning a QR code.
    Pix,
    Card,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Pix => write!(f, "pix"),
            PaymentMethod::Card => write!(f, "card"),
        }
    }
}

/// Tokenized card details. Raw card numbers never reach the checkout server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardData {
    pub token: String,
    #[serde(default = "default_installments")]
    pub installments: u32,
}

fn default_installments() -> u32 {
    1
}

/// Status of a charge at the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl std::fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChargeStatus::Pending => write!(f, "pending"),
            ChargeStatus::Approved => write!(f, "approved"),
            ChargeStatus::Rejected => write!(f, "rejected"),
            ChargeStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Request body for `POST /api/v1/payments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    pub method: PaymentMethod,
    /// Amount the customer was shown. Must equal the stored order total.
    pub total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub whatsapp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<CardData>,
}

/// Response of a payment creation.
///
/// Gateway refusals are reported with `success: false` and the gateway's
/// message in `error`, not as transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_id: Option<String>,
    /// PIX copy-and-paste payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ChargeStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CreatePaymentResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            charge_id: None,
            qr_code: None,
            qr_code_base64: None,
            status: None,
            error: Some(error.into()),
        }
    }
}
