use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use kanau::processor::Processor;
use smm_core::checkout::validate_draft;
use smm_core::config::StoreSettings;
use smm_core::entities::order_records::{CreateOrderRecord, GetOrderRecordById, OrderRecord};
use smm_core::entities::services::GetServiceById;
use smm_core::events::{EventSenders, OrderEvent};
use smm_core::framework::EntityProcessor;
use smm_core::pricing::compute_price;
use smm_sdk::objects::{AppliedCoupon, CreateOrderRequest};
use uuid::Uuid;

use super::ApiError;
use super::coupons::check_coupon;
use crate::state::AppState;

/// `POST /orders`: create a new order awaiting payment.
pub(super) async fn create_order(
    state: State<AppState>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.settings.snapshot().await;
    let record = place_order(&state.processor(), &settings, &state.events, body).await?;
    Ok((StatusCode::CREATED, Json(record.to_response())))
}

/// Validate the draft, re-check its coupon and store the order.
///
/// The stored total is always computed here; whatever the client showed is
/// ignored.
async fn place_order<P: EntityProcessor>(
    processor: &P,
    settings: &StoreSettings,
    events: &EventSenders,
    body: CreateOrderRequest,
) -> Result<OrderRecord, ApiError> {
    let service_id = body.service_id;
    let express_fee = settings.express_fee();
    let service = processor
        .process(GetServiceById { service_id })
        .await?
        .ok_or(ApiError::ServiceNotFound)?
        .into_service(settings.express_enabled);

    let mut draft = body.draft;
    validate_draft(&service, &draft)?;
    draft.is_express &= service.is_express_eligible;
    let quantity = Some(draft.quantity);

    let mut coupon_id = None;
    let mut applied_coupon = None;
    if let Some(code) = draft.coupon_code() {
        let order_value =
            compute_price(&service, quantity, draft.is_express, express_fee, None).final_price;
        let check = check_coupon(
            processor,
            code,
            service_id,
            &draft.customer_whatsapp,
            order_value,
        )
        .await?;
        match (check.rule, check.result) {
            (Some(rule), Ok(discount_amount)) => {
                coupon_id = Some(rule.id);
                applied_coupon = Some(AppliedCoupon {
                    discount_amount,
                    coupon_name: rule.name,
                });
            }
            (_, Err(rejection)) => return Err(ApiError::Coupon(rejection.to_string())),
            (None, Ok(_)) => return Err(ApiError::Coupon("coupon not found".to_string())),
        }
    }

    let quote = compute_price(
        &service,
        quantity,
        draft.is_express,
        express_fee,
        applied_coupon.as_ref(),
    );
    let record = processor
        .process(CreateOrderRecord {
            service_id,
            draft,
            coupon_id,
            discount_amount: applied_coupon
                .map(|c| c.discount_amount)
                .unwrap_or_default(),
            total_price: quote.final_price,
        })
        .await?;

    tracing::info!(
        order_id = %record.order_id,
        service_id,
        total_price = %record.total_price,
        "Order created"
    );
    events.emit_order_event(OrderEvent::Created {
        order_id: record.order_id,
    });
    Ok(record)
}

/// `GET /orders/{order_id}/status`: payment confirmation polling.
pub(super) async fn get_order_status(
    state: State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .processor()
        .process(GetOrderRecordById { order_id })
        .await?
        .ok_or(ApiError::OrderNotFound)?;

    Ok(Json(record.status_report()))
}
