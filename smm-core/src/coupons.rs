//! Server-side coupon rules.

use rust_decimal::Decimal;
use smm_sdk::objects::CouponValidation;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountKind {
    /// Percentage of the order value, `0..=100`.
    Percent(Decimal),
    /// Fixed amount in store currency.
    Fixed(Decimal),
}

/// A coupon as stored, with its usage counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRule {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub discount: DiscountKind,
    pub active: bool,
    pub expires_at: Option<time::PrimitiveDateTime>,
    pub max_uses: Option<u32>,
    pub uses: u32,
    pub once_per_customer: bool,
    /// Services the coupon is limited to. Empty means every service.
    pub service_ids: Vec<i64>,
    pub min_order_value: Option<Decimal>,
}

/// Facts about the order a coupon is being applied to.
#[derive(Debug, Clone, Copy)]
pub struct CouponContext {
    pub order_value: Decimal,
    pub service_id: i64,
    pub now: time::PrimitiveDateTime,
    /// How many times this customer already used the coupon.
    pub customer_uses: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("coupon not found")]
    NotFound,
    #[error("coupon is no longer active")]
    Inactive,
    #[error("coupon expired")]
    Expired,
    #[error("coupon usage limit reached")]
    UsageLimitReached,
    #[error("coupon already used by this customer")]
    AlreadyUsed,
    #[error("coupon is not valid for this service")]
    NotApplicableToService,
    #[error("minimum order value for this coupon is {minimum}")]
    BelowMinimumOrder { minimum: Decimal },
}

impl CouponRule {
    /// Discount this coupon grants in `ctx`, capped at the order value.
    pub fn evaluate(&self, ctx: &CouponContext) -> Result<Decimal, CouponRejection> {
        if !self.active {
            return Err(CouponRejection::Inactive);
        }
        if self.expires_at.is_some_and(|expires_at| ctx.now >= expires_at) {
            return Err(CouponRejection::Expired);
        }
        if self.max_uses.is_some_and(|max| self.uses >= max) {
            return Err(CouponRejection::UsageLimitReached);
        }
        if self.once_per_customer && ctx.customer_uses > 0 {
            return Err(CouponRejection::AlreadyUsed);
        }
        if !self.service_ids.is_empty() && !self.service_ids.contains(&ctx.service_id) {
            return Err(CouponRejection::NotApplicableToService);
        }
        if let Some(minimum) = self.min_order_value
            && ctx.order_value < minimum
        {
            return Err(CouponRejection::BelowMinimumOrder { minimum });
        }

        let order_value = ctx.order_value.max(Decimal::ZERO);
        let discount = match self.discount {
            DiscountKind::Percent(percent) => {
                let percent = percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
                (order_value * percent / Decimal::ONE_HUNDRED).round_dp(2)
            }
            DiscountKind::Fixed(amount) => amount.max(Decimal::ZERO),
        };
        Ok(discount.min(order_value))
    }
}

/// Normalize a customer-typed code for lookup.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Render an evaluation as the validator's wire answer.
pub fn to_validation(
    rule: Option<&CouponRule>,
    result: Result<Decimal, CouponRejection>,
) -> CouponValidation {
    match (rule, result) {
        (Some(rule), Ok(discount)) => CouponValidation::accepted(rule.name.clone(), discount),
        (None, Ok(_)) => CouponValidation::rejected(CouponRejection::NotFound.to_string()),
        (_, Err(rejection)) => CouponValidation::rejected(rejection.to_string()),
    }
}
