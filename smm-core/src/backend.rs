//! Collaborators the checkout flow talks to.
//!
//! Production code uses [`smm_sdk::client::StoreClient`]; tests plug in
//! in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use smm_sdk::client::{ClientError, StoreClient};
use smm_sdk::objects::{
    CouponValidation, CreateOrderRequest, CreatePaymentRequest, CreatePaymentResponse,
    OrderResponse, OrderStatusReport, ValidateCouponRequest,
};
use uuid::Uuid;

use crate::poller::StatusChecker;

/// Order store, payment gateway adapter, status checker and coupon
/// validator, as seen from the checkout.
#[async_trait]
pub trait CheckoutBackend: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn create_order(&self, request: &CreateOrderRequest)
    -> Result<OrderResponse, Self::Error>;

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<CreatePaymentResponse, Self::Error>;

    async fn check_status(&self, order_id: Uuid) -> Result<OrderStatusReport, Self::Error>;

    async fn validate_coupon(
        &self,
        request: &ValidateCouponRequest,
    ) -> Result<CouponValidation, Self::Error>;
}

#[async_trait]
impl CheckoutBackend for StoreClient {
    type Error = ClientError;

    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderResponse, ClientError> {
        StoreClient::create_order(self, request).await
    }

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<CreatePaymentResponse, ClientError> {
        StoreClient::create_payment(self, request).await
    }

    async fn check_status(&self, order_id: Uuid) -> Result<OrderStatusReport, ClientError> {
        self.order_status(order_id).await
    }

    async fn validate_coupon(
        &self,
        request: &ValidateCouponRequest,
    ) -> Result<CouponValidation, ClientError> {
        StoreClient::validate_coupon(self, request).await
    }
}

/// Exposes a backend's status check to the poller.
pub struct BackendStatus<B>(pub Arc<B>);

#[async_trait]
impl<B: CheckoutBackend> StatusChecker for BackendStatus<B> {
    type Error = B::Error;

    async fn check_status(&self, order_id: Uuid) -> Result<OrderStatusReport, B::Error> {
        self.0.check_status(order_id).await
    }
}
