pub mod catalog;
pub mod coupon;
pub mod notification;
pub mod order;
pub mod payment;

pub use catalog::{Service, ServiceBoundsError, StorefrontSettings};
pub use coupon::{AppliedCoupon, CouponSummary, CouponValidation, ValidateCouponRequest};
pub use notification::{NotificationKind, NotificationPayload};
pub use order::{CreateOrderRequest, DripFeed, OrderDraft, OrderResponse, OrderStatus, OrderStatusReport};
pub use payment::{CardData, ChargeStatus, CreatePaymentRequest, CreatePaymentResponse, PaymentMethod};
