use axum::{Json, extract::State, response::IntoResponse};
use kanau::processor::Processor;
use rust_decimal::Decimal;
use smm_core::coupons::{CouponContext, CouponRejection, CouponRule, normalize_code, to_validation};
use smm_core::entities::coupons::{CountCouponUsesByCustomer, GetCouponByCode};
use smm_core::framework::EntityProcessor;
use smm_core::utils::now_primitive;
use smm_sdk::objects::ValidateCouponRequest;

use super::ApiError;
use crate::state::AppState;

/// Outcome of checking a coupon code against an order.
pub(super) struct CouponCheck {
    pub rule: Option<CouponRule>,
    pub result: Result<Decimal, CouponRejection>,
}

/// Look up `code` and evaluate it for an order of `order_value`.
pub(super) async fn check_coupon<P: EntityProcessor>(
    processor: &P,
    code: &str,
    service_id: i64,
    whatsapp: &str,
    order_value: Decimal,
) -> Result<CouponCheck, sqlx::Error> {
    let Some(record) = processor
        .process(GetCouponByCode {
            code: normalize_code(code),
        })
        .await?
    else {
        return Ok(CouponCheck {
            rule: None,
            result: Err(CouponRejection::NotFound),
        });
    };
    let rule = CouponRule::from(record);

    let customer_uses = if rule.once_per_customer && !whatsapp.trim().is_empty() {
        processor
            .process(CountCouponUsesByCustomer {
                coupon_id: rule.id,
                customer_whatsapp: whatsapp.to_string(),
            })
            .await?
    } else {
        0
    };

    let result = rule.evaluate(&CouponContext {
        order_value,
        service_id,
        now: now_primitive(),
        customer_uses,
    });
    Ok(CouponCheck {
        rule: Some(rule),
        result,
    })
}

/// `POST /coupons/validate`: check a coupon for the current draft.
///
/// Rejected coupons answer `200` with `valid: false`.
pub(super) async fn validate_coupon(
    state: State<AppState>,
    Json(body): Json<ValidateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let check = check_coupon(
        &state.processor(),
        &body.code,
        body.service_id,
        &body.whatsapp,
        body.order_value,
    )
    .await?;

    if let Err(rejection) = &check.result {
        tracing::debug!(code = %body.code, reason = %rejection, "Coupon rejected");
    }
    Ok(Json(to_validation(check.rule.as_ref(), check.result)))
}
