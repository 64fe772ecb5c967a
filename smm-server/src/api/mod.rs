//! Storefront API handlers.
//!
//! # Endpoints
//!
//! - `GET  /services`: active catalog
//! - `GET  /settings`: express pricing and payment polling options
//! - `POST /orders`: validate, price and store a new order
//! - `GET  /orders/{order_id}/status`: payment confirmation polling
//! - `POST /payments`: create a PIX or card charge for an order
//! - `POST /coupons/validate`: check a coupon against an order value

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use smm_core::checkout::ValidationError;
use smm_core::entities::order_records::CreateOrderError;

use crate::state::AppState;

mod catalog;
mod coupons;
mod orders;
mod payments;

/// Build the storefront API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/services", get(catalog::list_services))
        .route("/settings", get(catalog::get_settings))
        .route("/orders", post(orders::create_order))
        .route(
            "/orders/{order_id}/status",
            get(orders::get_order_status),
        )
        .route("/payments", post(payments::create_payment))
        .route("/coupons/validate", post(coupons::validate_coupon))
}

/// Errors that can occur in API handlers.
#[derive(Debug)]
enum ApiError {
    /// A database query failed.
    Database(sqlx::Error),
    /// The requested order was not found.
    OrderNotFound,
    /// The requested service is unknown or inactive.
    ServiceNotFound,
    /// The order draft failed validation.
    Validation(ValidationError),
    /// The coupon attached to the order was rejected.
    Coupon(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
            ApiError::OrderNotFound => (StatusCode::NOT_FOUND, "order not found".to_string()),
            ApiError::ServiceNotFound => {
                (StatusCode::NOT_FOUND, "service not found".to_string())
            }
            ApiError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::Coupon(reason) => (StatusCode::UNPROCESSABLE_ENTITY, reason.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Database(e) = &self {
            tracing::error!(error = %e, "API database error");
        }
        let (status, error) = self.status_and_message();
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Database(e)
    }
}

impl From<CreateOrderError> for ApiError {
    fn from(e: CreateOrderError) -> Self {
        match e {
            CreateOrderError::Database(e) => ApiError::Database(e),
            CreateOrderError::Coupon(rejection) => ApiError::Coupon(rejection.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smm_core::coupons::CouponRejection;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound)
                .status_and_message()
                .0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::OrderNotFound.status_and_message().0,
            StatusCode::NOT_FOUND
        );
        let (status, message) =
            ApiError::Validation(ValidationError::MissingWhatsapp).status_and_message();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(message, "enter a WhatsApp number");
    }

    #[test]
    fn test_coupon_lost_at_insert_is_unprocessable() {
        let (status, message) =
            ApiError::from(CreateOrderError::Coupon(CouponRejection::UsageLimitReached))
                .status_and_message();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(message, "coupon usage limit reached");
    }

    #[test]
    fn test_database_errors_are_not_leaked() {
        let (_, message) = ApiError::Database(sqlx::Error::PoolTimedOut).status_and_message();
        assert_eq!(message, "internal server error");
    }
}
