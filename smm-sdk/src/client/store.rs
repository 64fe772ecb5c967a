//! Storefront API client (checkout frontend → checkout server).

use reqwest::Client;
use url::Url;
use uuid::Uuid;

use super::ClientError;
use crate::objects::{
    CouponValidation, CreateOrderRequest, CreatePaymentRequest, CreatePaymentResponse,
    OrderResponse, OrderStatusReport, Service, StorefrontSettings, ValidateCouponRequest,
};

/// Typed HTTP client for the storefront **checkout API**.
#[derive(Debug, Clone)]
pub struct StoreClient {
    http: Client,
    base_url: Url,
}

impl StoreClient {
    /// Create a new `StoreClient` pointed at the root URL of the server.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /api/v1/services`: list the active catalog.
    pub async fn list_services(&self) -> Result<Vec<Service>, ClientError> {
        let url = self.base_url.join("/api/v1/services")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/settings`: express pricing and payment polling options.
    pub async fn storefront_settings(&self) -> Result<StorefrontSettings, ClientError> {
        let url = self.base_url.join("/api/v1/settings")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/v1/orders`: submit a draft and create a pending order.
    pub async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderResponse, ClientError> {
        let url = self.base_url.join("/api/v1/orders")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/orders/{order_id}/status`: poll payment/fulfillment status.
    pub async fn order_status(&self, order_id: Uuid) -> Result<OrderStatusReport, ClientError> {
        let url = self
            .base_url
            .join(&format!("/api/v1/orders/{order_id}/status"))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/v1/payments`: create a PIX or card charge for an order.
    pub async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<CreatePaymentResponse, ClientError> {
        let url = self.base_url.join("/api/v1/payments")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/v1/coupons/validate`: check a coupon against an order value.
    pub async fn validate_coupon(
        &self,
        request: &ValidateCouponRequest,
    ) -> Result<CouponValidation, ClientError> {
        let url = self.base_url.join("/api/v1/coupons/validate")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
