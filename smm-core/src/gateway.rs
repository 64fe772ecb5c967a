//! Payment gateway seam.
//!
//! Checkout talks to the payment processor through [`PaymentGateway`]. The
//! crate ships [`SandboxGateway`] for local runs and tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use smm_sdk::objects::{CardData, ChargeStatus, PaymentMethod};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub email: Option<String>,
    pub whatsapp: String,
    pub card: Option<CardData>,
}

/// A charge as reported by the gateway right after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    pub charge_id: String,
    pub status: ChargeStatus,
    /// PIX copy-and-paste payload.
    pub qr_code: Option<String>,
    pub qr_code_base64: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment declined: {0}")]
    Declined(String),
    #[error("invalid charge request: {0}")]
    InvalidRequest(String),
    #[error("unknown charge: {0}")]
    UnknownCharge(String),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_charge(&self, request: ChargeRequest) -> Result<Charge, GatewayError>;

    async fn charge_status(&self, charge_id: &str) -> Result<ChargeStatus, GatewayError>;
}

/// Card token the sandbox always declines.
pub const SANDBOX_DECLINED_TOKEN: &str = "declined";

#[derive(Debug, Clone, Copy)]
struct SandboxCharge {
    created_at: Instant,
    status: ChargeStatus,
}

/// In-memory gateway. Card charges settle immediately; PIX charges are
/// approved once `approve_after` has elapsed.
#[derive(Debug)]
pub struct SandboxGateway {
    approve_after: Duration,
    charges: Mutex<HashMap<String, SandboxCharge>>,
}

impl SandboxGateway {
    pub fn new(approve_after: Duration) -> Self {
        Self {
            approve_after,
            charges: Mutex::new(HashMap::new()),
        }
    }

    fn pix_payload(order_id: Uuid, amount: Decimal) -> String {
        format!("SANDBOXPIX|{}|{}", order_id.simple(), amount.round_dp(2))
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_charge(&self, request: ChargeRequest) -> Result<Charge, GatewayError> {
        if request.amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidRequest(
                "amount must be positive".to_string(),
            ));
        }
        let charge_id = format!("sbx_{}", Uuid::now_v7().simple());
        let charge = match request.method {
            PaymentMethod::Pix => {
                let qr_code = Self::pix_payload(request.order_id, request.amount);
                let qr_code_base64 = fast32::base64::RFC4648.encode(qr_code.as_bytes());
                Charge {
                    charge_id,
                    status: ChargeStatus::Pending,
                    qr_code: Some(qr_code),
                    qr_code_base64: Some(qr_code_base64),
                }
            }
            PaymentMethod::Card => {
                let token = request
                    .card
                    .as_ref()
                    .map(|card| card.token.trim())
                    .unwrap_or_default();
                if token.is_empty() {
                    return Err(GatewayError::InvalidRequest(
                        "card token is required".to_string(),
                    ));
                }
                if token == SANDBOX_DECLINED_TOKEN {
                    return Err(GatewayError::Declined("card declined".to_string()));
                }
                Charge {
                    charge_id,
                    status: ChargeStatus::Approved,
                    qr_code: None,
                    qr_code_base64: None,
                }
            }
        };

        self.charges.lock().await.insert(
            charge.charge_id.clone(),
            SandboxCharge {
                created_at: Instant::now(),
                status: charge.status,
            },
        );
        tracing::debug!(charge_id = %charge.charge_id, method = %request.method, "Sandbox charge created");
        Ok(charge)
    }

    async fn charge_status(&self, charge_id: &str) -> Result<ChargeStatus, GatewayError> {
        let mut charges = self.charges.lock().await;
        let charge = charges
            .get_mut(charge_id)
            .ok_or_else(|| GatewayError::UnknownCharge(charge_id.to_string()))?;
        if charge.status == ChargeStatus::Pending && charge.created_at.elapsed() >= self.approve_after
        {
            charge.status = ChargeStatus::Approved;
        }
        Ok(charge.status)
    }
}
