//! Coupon validation request/response types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request body for `POST /api/v1/coupons/validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    /// Order value the discount is computed against (after the express fee).
    pub order_value: Decimal,
    pub service_id: i64,
    pub whatsapp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponSummary {
    pub name: String,
}

/// Result of a coupon validation.
///
/// Invalid coupons are not transport errors: the server answers `200` with
/// `valid: false` and a human readable `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<CouponSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CouponValidation {
    pub fn accepted(name: impl Into<String>, discount_amount: Decimal) -> Self {
        Self {
            valid: true,
            discount_amount: Some(discount_amount),
            coupon: Some(CouponSummary { name: name.into() }),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            discount_amount: None,
            coupon: None,
            error: Some(error.into()),
        }
    }
}

/// A coupon accepted for the current draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub discount_amount: Decimal,
    pub coupon_name: String,
}

impl AppliedCoupon {
    /// Build from a validator answer. Returns `None` unless it is valid.
    ///
    /// Negative discounts are clamped to zero; a missing coupon name falls
    /// back to the code the customer typed.
    pub fn from_validation(validation: &CouponValidation, code: &str) -> Option<Self> {
        if !validation.valid {
            return None;
        }
        let discount_amount = validation
            .discount_amount
            .unwrap_or_default()
            .max(Decimal::ZERO);
        let coupon_name = validation
            .coupon
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| code.to_string());
        Some(Self {
            discount_amount,
            coupon_name,
        })
    }
}
