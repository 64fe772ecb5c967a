use axum::{Json, extract::State, response::IntoResponse};
use kanau::processor::Processor;
use smm_core::checkout::validate_payment_method;
use smm_core::entities::charges::AttachCharge;
use smm_core::entities::order_records::{GetOrderRecordById, OrderStatus};
use smm_core::events::{ChargeCreated, EventSenders};
use smm_core::framework::EntityProcessor;
use smm_core::gateway::{ChargeRequest, PaymentGateway};
use smm_core::processors::payment_sync::apply_charge_status;
use smm_sdk::objects::{ChargeStatus, CreatePaymentRequest, CreatePaymentResponse};

use super::ApiError;
use crate::state::AppState;

/// `POST /payments`: create a charge for a pending order.
///
/// Refusals (validation, amount mismatch, gateway decline) answer `200`
/// with `success: false`.
pub(super) async fn create_payment(
    state: State<AppState>,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = start_payment(
        &state.processor(),
        state.gateway.as_ref(),
        &state.events,
        body,
    )
    .await?;
    Ok(Json(response))
}

/// Create and record a charge.
///
/// Every charge is kept, so a customer who retries payment can still settle
/// the order with an earlier PIX code. A charge refused at creation leaves
/// the order pending for another attempt.
async fn start_payment<P: EntityProcessor>(
    processor: &P,
    gateway: &dyn PaymentGateway,
    events: &EventSenders,
    body: CreatePaymentRequest,
) -> Result<CreatePaymentResponse, ApiError> {
    let order_id = body.order_id;
    if let Err(e) = validate_payment_method(body.method, body.card.as_ref()) {
        return Ok(CreatePaymentResponse::failed(e.to_string()));
    }

    let record = processor
        .process(GetOrderRecordById { order_id })
        .await?
        .ok_or(ApiError::OrderNotFound)?;

    if record.status != OrderStatus::PendingPayment {
        return Ok(CreatePaymentResponse::failed("order is not awaiting payment"));
    }
    if body.total.round_dp(2) != record.total_price.round_dp(2) {
        tracing::warn!(
            order_id = %order_id,
            shown = %body.total,
            stored = %record.total_price,
            "Payment total does not match order"
        );
        return Ok(CreatePaymentResponse::failed(
            "amount does not match the order total",
        ));
    }

    let charge = match gateway
        .create_charge(ChargeRequest {
            order_id,
            amount: record.total_price.round_dp(2),
            method: body.method,
            email: body.email.or(record.customer_email),
            whatsapp: body.whatsapp,
            card: body.card,
        })
        .await
    {
        Ok(charge) => charge,
        Err(e) => {
            tracing::warn!(order_id = %order_id, error = %e, "Charge creation failed");
            return Ok(CreatePaymentResponse::failed(e.to_string()));
        }
    };

    let attached = processor
        .process(AttachCharge {
            order_id,
            charge_id: charge.charge_id.clone(),
            method: body.method.into(),
            status: charge.status.into(),
        })
        .await?;
    if !attached {
        return Ok(CreatePaymentResponse::failed("order is not awaiting payment"));
    }

    tracing::info!(
        order_id = %order_id,
        charge_id = %charge.charge_id,
        method = %body.method,
        status = %charge.status,
        "Charge created"
    );
    match charge.status {
        ChargeStatus::Pending => events.emit_charge_created(ChargeCreated { order_id }),
        ChargeStatus::Approved => {
            apply_charge_status(processor, &events.order_event, order_id, charge.status).await?;
        }
        ChargeStatus::Rejected | ChargeStatus::Expired => {
            return Ok(CreatePaymentResponse::failed(format!(
                "payment {}",
                charge.status
            )));
        }
    }

    Ok(CreatePaymentResponse {
        success: true,
        charge_id: Some(charge.charge_id),
        qr_code: charge.qr_code,
        qr_code_base64: charge.qr_code_base64,
        status: Some(charge.status),
        error: None,
    })
}
