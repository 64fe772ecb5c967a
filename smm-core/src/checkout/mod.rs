//! Checkout flow controller.
//!
//! [`CheckoutFlow`] owns everything the checkout page used to keep in
//! component state: the selected service, the draft, the applied coupon
//! and the payment poller handle.

mod validation;

pub use validation::{ValidationError, validate_draft, validate_payment_method, validate_quantity};

use std::sync::Arc;

use smm_sdk::objects::{
    AppliedCoupon, CardData, CreateOrderRequest, CreatePaymentRequest, CreatePaymentResponse,
    DripFeed, OrderDraft, OrderResponse, OrderStatusReport, PaymentMethod, Service,
    ValidateCouponRequest,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{BackendStatus, CheckoutBackend};
use crate::config::StoreSettings;
use crate::poller::{PaymentPoller, PollHandle, PollState};
use crate::pricing::{PriceQuote, compute_price};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Coupon refused or the validator could not be reached.
    #[error("coupon: {0}")]
    Coupon(String),

    /// The gateway refused the charge or could not be reached.
    #[error("payment: {0}")]
    Payment(String),

    /// The order could not be stored.
    #[error("order: {0}")]
    Store(String),
}

/// A stored order together with its freshly created charge.
#[derive(Debug, Clone)]
pub struct PaymentCreated {
    pub order: OrderResponse,
    pub payment: CreatePaymentResponse,
}

pub struct CheckoutFlow<B: CheckoutBackend + 'static> {
    backend: Arc<B>,
    settings: StoreSettings,
    service: Service,
    draft: OrderDraft,
    applied_coupon: Option<AppliedCoupon>,
    poll: Option<PollHandle>,
}

impl<B: CheckoutBackend + 'static> CheckoutFlow<B> {
    /// Start a checkout for `service` with its default quantity.
    pub fn new(service: Service, settings: StoreSettings, backend: Arc<B>) -> Self {
        let draft = OrderDraft {
            quantity: service.default_quantity,
            ..OrderDraft::default()
        };
        Self {
            backend,
            settings,
            service,
            draft,
            applied_coupon: None,
            poll: None,
        }
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn draft(&self) -> &OrderDraft {
        &self.draft
    }

    pub fn applied_coupon(&self) -> Option<&AppliedCoupon> {
        self.applied_coupon.as_ref()
    }

    /// Switch to another service. Quantity resets to its default.
    pub fn select_service(&mut self, service: Service) {
        self.draft.quantity = service.default_quantity;
        self.service = service;
        self.clear_coupon();
    }

    pub fn set_quantity(&mut self, quantity: u64) {
        if self.draft.quantity != quantity {
            self.draft.quantity = quantity;
            self.clear_coupon();
        }
    }

    pub fn set_coupon_code(&mut self, code: Option<String>) {
        if self.draft.coupon_code != code {
            self.draft.coupon_code = code;
            self.clear_coupon();
        }
    }

    pub fn set_express(&mut self, is_express: bool) {
        self.draft.is_express = is_express;
    }

    pub fn set_drip_feed(&mut self, drip_feed: Option<DripFeed>) {
        self.draft.drip_feed = drip_feed;
    }

    pub fn set_target_url(&mut self, target_url: impl Into<String>) {
        self.draft.target_url = target_url.into();
    }

    pub fn set_contact(&mut self, whatsapp: impl Into<String>, email: Option<String>) {
        self.draft.customer_whatsapp = whatsapp.into();
        self.draft.customer_email = email;
    }

    /// Current price including express fee and applied coupon.
    pub fn quote(&self) -> PriceQuote {
        self.quote_with(self.applied_coupon.as_ref())
    }

    fn quote_with(&self, coupon: Option<&AppliedCoupon>) -> PriceQuote {
        compute_price(
            &self.service,
            Some(self.draft.quantity),
            self.draft.is_express,
            self.settings.express_fee(),
            coupon,
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_draft(&self.service, &self.draft)
    }

    /// Validate the entered coupon code against the current order value.
    ///
    /// Any failure clears a previously applied coupon.
    pub async fn apply_coupon(&mut self) -> Result<&AppliedCoupon, CheckoutError> {
        self.clear_coupon();

        let code = self
            .draft
            .coupon_code()
            .map(str::to_string)
            .ok_or_else(|| CheckoutError::Coupon("enter a coupon code".to_string()))?;
        validate_quantity(&self.service, self.draft.quantity)?;

        let request = ValidateCouponRequest {
            code: code.clone(),
            order_value: self.quote_with(None).final_price,
            service_id: self.service.id,
            whatsapp: self.draft.customer_whatsapp.clone(),
        };

        let validation = self.backend.validate_coupon(&request).await.map_err(|e| {
            warn!(code = %code, error = %e, "Coupon validation request failed");
            CheckoutError::Coupon(e.to_string())
        })?;

        match AppliedCoupon::from_validation(&validation, &code) {
            Some(applied) => {
                debug!(code = %code, discount = %applied.discount_amount, "Coupon applied");
                Ok(self.applied_coupon.insert(applied))
            }
            None => Err(CheckoutError::Coupon(
                validation
                    .error
                    .unwrap_or_else(|| "invalid coupon".to_string()),
            )),
        }
    }

    /// Store the order and create its charge.
    ///
    /// Nothing is sent when the draft fails validation. Payment errors are
    /// returned as-is; the caller decides whether to try again.
    pub async fn submit(
        &mut self,
        method: PaymentMethod,
        card: Option<CardData>,
    ) -> Result<PaymentCreated, CheckoutError> {
        self.validate()?;
        validate_payment_method(method, card.as_ref())?;

        let order_request = CreateOrderRequest {
            service_id: self.service.id,
            draft: self.draft.clone(),
        };
        let order = self
            .backend
            .create_order(&order_request)
            .await
            .map_err(|e| CheckoutError::Store(e.to_string()))?;

        let expected = self.quote().final_price;
        if order.total_price != expected {
            warn!(
                order_id = %order.order_id,
                expected = %expected,
                stored = %order.total_price,
                "Server priced the order differently"
            );
        }

        let payment_request = CreatePaymentRequest {
            order_id: order.order_id,
            method,
            total: order.total_price,
            email: self.draft.customer_email.clone(),
            whatsapp: self.draft.customer_whatsapp.clone(),
            card,
        };
        let payment = self
            .backend
            .create_payment(&payment_request)
            .await
            .map_err(|e| CheckoutError::Payment(e.to_string()))?;

        if !payment.success {
            return Err(CheckoutError::Payment(
                payment
                    .error
                    .unwrap_or_else(|| "payment could not be created".to_string()),
            ));
        }

        info!(order_id = %order.order_id, method = %method, "Order submitted");
        Ok(PaymentCreated { order, payment })
    }

    /// Start waiting for the payment of `order_id`, replacing any poller
    /// this flow already runs.
    pub fn watch_payment<A, T>(&mut self, order_id: Uuid, on_approved: A, on_timeout: T)
    where
        A: FnOnce(OrderStatusReport) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        self.cancel_watch();
        let poller = PaymentPoller::new(self.settings.poll);
        let checker = Arc::new(BackendStatus(self.backend.clone()));
        self.poll = Some(poller.spawn(order_id, checker, on_approved, on_timeout));
    }

    pub fn watch_state(&self) -> PollState {
        self.poll.as_ref().map_or(PollState::Idle, PollHandle::state)
    }

    pub fn cancel_watch(&mut self) {
        if let Some(handle) = self.poll.take() {
            handle.cancel();
        }
    }

    fn clear_coupon(&mut self) {
        self.applied_coupon = None;
    }
}

impl<B: CheckoutBackend + 'static> Drop for CheckoutFlow<B> {
    fn drop(&mut self) {
        self.cancel_watch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use smm_sdk::objects::{ChargeStatus, CouponValidation, OrderStatus};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[derive(Debug, thiserror::Error)]
    #[error("backend unavailable")]
    struct Unavailable;

    #[derive(Default)]
    struct FakeBackend {
        coupon_requests: Mutex<Vec<ValidateCouponRequest>>,
        orders: Mutex<Vec<CreateOrderRequest>>,
        payments: Mutex<Vec<CreatePaymentRequest>>,
        decline_payments: bool,
        coupon_down: bool,
        status_calls: AtomicUsize,
    }

    #[async_trait]
    impl CheckoutBackend for FakeBackend {
        type Error = Unavailable;

        async fn create_order(
            &self,
            request: &CreateOrderRequest,
        ) -> Result<OrderResponse, Unavailable> {
            self.orders.lock().unwrap().push(request.clone());
            Ok(OrderResponse {
                order_id: Uuid::nil(),
                service_id: request.service_id,
                target_url: request.draft.target_url.clone(),
                quantity: request.draft.quantity,
                is_express: request.draft.is_express,
                drip_feed: request.draft.drip_feed,
                coupon_code: request.draft.coupon_code.clone(),
                discount_amount: Decimal::ZERO,
                total_price: Decimal::new(71988, 3),
                status: OrderStatus::PendingPayment,
                created_at: 0,
            })
        }

        async fn create_payment(
            &self,
            request: &CreatePaymentRequest,
        ) -> Result<CreatePaymentResponse, Unavailable> {
            self.payments.lock().unwrap().push(request.clone());
            if self.decline_payments {
                return Ok(CreatePaymentResponse::failed("card declined"));
            }
            Ok(CreatePaymentResponse {
                success: true,
                charge_id: Some("ch_1".to_string()),
                qr_code: Some("000201".to_string()),
                qr_code_base64: None,
                status: Some(ChargeStatus::Pending),
                error: None,
            })
        }

        async fn check_status(&self, _order_id: Uuid) -> Result<OrderStatusReport, Unavailable> {
            let call = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(OrderStatusReport {
                payment_approved: call >= 2,
                status: OrderStatus::PendingPayment,
            })
        }

        async fn validate_coupon(
            &self,
            request: &ValidateCouponRequest,
        ) -> Result<CouponValidation, Unavailable> {
            if self.coupon_down {
                return Err(Unavailable);
            }
            self.coupon_requests.lock().unwrap().push(request.clone());
            if request.code == "TEN" {
                Ok(CouponValidation::accepted("Ten off", Decimal::new(10, 0)))
            } else {
                Ok(CouponValidation::rejected("coupon not found"))
            }
        }
    }

    fn service() -> Service {
        Service {
            id: 4,
            name: "Instagram Followers".to_string(),
            platform: "instagram".to_string(),
            service_type: "followers".to_string(),
            price_per_thousand: Decimal::new(5999, 2),
            min_quantity: 100,
            max_quantity: 10_000,
            default_quantity: 1000,
            is_express_eligible: true,
        }
    }

    fn settings() -> StoreSettings {
        StoreSettings {
            express_enabled: true,
            express_fee_percent: Decimal::new(20, 0),
            ..StoreSettings::default()
        }
    }

    fn flow(backend: FakeBackend) -> (CheckoutFlow<FakeBackend>, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        let mut flow = CheckoutFlow::new(service(), settings(), backend.clone());
        flow.set_target_url("https://instagram.com/someone");
        flow.set_contact("+5511999999999", None);
        (flow, backend)
    }

    #[tokio::test]
    async fn test_coupon_applies_after_express() {
        let (mut flow, backend) = flow(FakeBackend::default());
        flow.set_express(true);
        flow.set_coupon_code(Some("TEN".to_string()));

        let applied = flow.apply_coupon().await.unwrap();
        assert_eq!(applied.coupon_name, "Ten off");
        assert_eq!(flow.quote().final_price, "61.988".parse::<Decimal>().unwrap());

        let requests = backend.coupon_requests.lock().unwrap();
        assert_eq!(requests[0].order_value, "71.988".parse::<Decimal>().unwrap());
        assert_eq!(requests[0].service_id, 4);
    }

    #[tokio::test]
    async fn test_quantity_change_clears_coupon() {
        let (mut flow, _) = flow(FakeBackend::default());
        flow.set_coupon_code(Some("TEN".to_string()));
        flow.apply_coupon().await.unwrap();

        flow.set_quantity(2000);
        assert!(flow.applied_coupon().is_none());
        assert_eq!(flow.quote().final_price, "119.98".parse::<Decimal>().unwrap());

        flow.apply_coupon().await.unwrap();
        flow.select_service(service());
        assert!(flow.applied_coupon().is_none());
        assert_eq!(flow.draft().quantity, 1000);
    }

    #[tokio::test]
    async fn test_rejected_coupon_clears_previous() {
        let (mut flow, _) = flow(FakeBackend::default());
        flow.set_coupon_code(Some("TEN".to_string()));
        flow.apply_coupon().await.unwrap();

        flow.set_coupon_code(Some("NOPE".to_string()));
        let err = flow.apply_coupon().await.unwrap_err();
        assert!(matches!(err, CheckoutError::Coupon(msg) if msg == "coupon not found"));
        assert!(flow.applied_coupon().is_none());
    }

    #[tokio::test]
    async fn test_coupon_validator_down() {
        let (mut flow, _) = flow(FakeBackend {
            coupon_down: true,
            ..FakeBackend::default()
        });
        flow.set_coupon_code(Some("TEN".to_string()));
        assert!(matches!(
            flow.apply_coupon().await,
            Err(CheckoutError::Coupon(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_quantity_skips_network() {
        let (mut flow, backend) = flow(FakeBackend::default());
        flow.set_quantity(5);
        flow.set_coupon_code(Some("TEN".to_string()));

        assert!(matches!(
            flow.apply_coupon().await,
            Err(CheckoutError::Validation(ValidationError::QuantityOutOfRange { .. }))
        ));
        assert!(matches!(
            flow.submit(PaymentMethod::Pix, None).await,
            Err(CheckoutError::Validation(_))
        ));
        assert!(backend.coupon_requests.lock().unwrap().is_empty());
        assert!(backend.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_creates_order_then_payment() {
        let (mut flow, backend) = flow(FakeBackend::default());
        flow.set_express(true);

        let created = flow.submit(PaymentMethod::Pix, None).await.unwrap();
        assert_eq!(created.payment.charge_id.as_deref(), Some("ch_1"));

        let payments = backend.payments.lock().unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].total, created.order.total_price);
        assert_eq!(payments[0].whatsapp, "+5511999999999");
    }

    #[tokio::test]
    async fn test_declined_payment_surfaces_gateway_message() {
        let (mut flow, _) = flow(FakeBackend {
            decline_payments: true,
            ..FakeBackend::default()
        });
        let card = CardData {
            token: "tok_declined".to_string(),
            installments: 1,
        };
        let err = flow.submit(PaymentMethod::Card, Some(card)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Payment(msg) if msg == "card declined"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_payment_uses_backend_status() {
        let (mut flow, backend) = flow(FakeBackend::default());
        let (tx, rx) = oneshot::channel();

        flow.watch_payment(
            Uuid::nil(),
            move |report| {
                let _ = tx.send(report);
            },
            || {},
        );
        assert!(rx.await.unwrap().payment_approved);
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_watch() {
        let (mut flow, backend) = flow(FakeBackend::default());
        flow.watch_payment(Uuid::nil(), |_| {}, || {});
        drop(flow);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
    }
}
