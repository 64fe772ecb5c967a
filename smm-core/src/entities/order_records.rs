use crate::coupons::CouponRejection;
use crate::entities::{PaymentMethodKind, to_i64, to_u64};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use smm_sdk::objects::{
    DripFeed, OrderDraft, OrderResponse, OrderStatus as SdkOrderStatus, OrderStatusReport,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderRecord {
    pub order_id: Uuid,
    pub service_id: i64,
    pub target_url: String,
    pub quantity: i64,
    pub customer_email: Option<String>,
    pub customer_whatsapp: String,
    pub coupon_id: Option<i64>,
    pub coupon_code: Option<String>,
    pub discount_amount: Decimal,
    pub is_express: bool,
    pub drip_daily_quantity: Option<i64>,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethodKind>,
    pub charge_id: Option<String>,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
    pub paid_at: Option<time::PrimitiveDateTime>,
}

/// Order status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `smm_sdk::objects::OrderStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "order_status")]
pub enum OrderStatus {
    PendingPayment,
    Processing,
    Completed,
    Cancelled,
    Refunded,
    Partial,
}

impl From<OrderStatus> for SdkOrderStatus {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::PendingPayment => SdkOrderStatus::PendingPayment,
            OrderStatus::Processing => SdkOrderStatus::Processing,
            OrderStatus::Completed => SdkOrderStatus::Completed,
            OrderStatus::Cancelled => SdkOrderStatus::Cancelled,
            OrderStatus::Refunded => SdkOrderStatus::Refunded,
            OrderStatus::Partial => SdkOrderStatus::Partial,
        }
    }
}

impl From<SdkOrderStatus> for OrderStatus {
    fn from(status: SdkOrderStatus) -> Self {
        match status {
            SdkOrderStatus::PendingPayment => OrderStatus::PendingPayment,
            SdkOrderStatus::Processing => OrderStatus::Processing,
            SdkOrderStatus::Completed => OrderStatus::Completed,
            SdkOrderStatus::Cancelled => OrderStatus::Cancelled,
            SdkOrderStatus::Refunded => OrderStatus::Refunded,
            SdkOrderStatus::Partial => OrderStatus::Partial,
        }
    }
}

impl OrderRecord {
    pub fn drip_feed(&self) -> Option<DripFeed> {
        self.drip_daily_quantity.map(|daily| DripFeed {
            daily_quantity: to_u64(daily),
        })
    }

    pub fn payment_approved(&self) -> bool {
        self.paid_at.is_some() || SdkOrderStatus::from(self.status).implies_payment()
    }

    pub fn status_report(&self) -> OrderStatusReport {
        OrderStatusReport {
            payment_approved: self.payment_approved(),
            status: self.status.into(),
        }
    }

    pub fn to_response(&self) -> OrderResponse {
        OrderResponse {
            order_id: self.order_id,
            service_id: self.service_id,
            target_url: self.target_url.clone(),
            quantity: to_u64(self.quantity),
            is_express: self.is_express,
            drip_feed: self.drip_feed(),
            coupon_code: self.coupon_code.clone(),
            discount_amount: self.discount_amount,
            total_price: self.total_price,
            status: self.status.into(),
            created_at: self.created_at.assume_utc().unix_timestamp(),
        }
    }
}

const ORDER_COLUMNS: &str = r#"
    order_id, service_id, target_url, quantity, customer_email, customer_whatsapp,
    coupon_id, coupon_code, discount_amount, is_express, drip_daily_quantity,
    total_price, status, payment_method, charge_id, created_at, updated_at, paid_at
"#;

#[derive(Debug, Clone)]
/// Insert a new order in `pending_payment`. When a coupon is attached its
/// usage is recorded in the same transaction.
pub struct CreateOrderRecord {
    pub service_id: i64,
    pub draft: OrderDraft,
    pub coupon_id: Option<i64>,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Error)]
pub enum CreateOrderError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The coupon ran out or was used by this customer after it was checked.
    #[error(transparent)]
    Coupon(#[from] CouponRejection),
}

impl Processor<CreateOrderRecord> for DatabaseProcessor {
    type Output = OrderRecord;
    type Error = CreateOrderError;
    #[tracing::instrument(skip_all, err, name = "SQL:CreateOrderRecord")]
    async fn process(&self, insert: CreateOrderRecord) -> Result<OrderRecord, CreateOrderError> {
        let order_id = Uuid::now_v7();
        let whatsapp = insert.draft.customer_whatsapp.trim();
        let coupon_code = insert
            .coupon_id
            .and_then(|_| insert.draft.coupon_code().map(str::to_uppercase));
        let mut tx = self.pool.begin().await?;

        if let Some(coupon_id) = insert.coupon_id {
            // Takes the coupon row lock; concurrent orders with the same
            // coupon queue here until this transaction ends.
            let once_per_customer: Option<bool> = sqlx::query_scalar(
                r#"
                UPDATE coupons SET uses = uses + 1
                WHERE id = $1 AND (max_uses IS NULL OR uses < max_uses)
                RETURNING once_per_customer
                "#,
            )
            .bind(coupon_id)
            .fetch_optional(&mut *tx)
            .await?;
            let Some(once_per_customer) = once_per_customer else {
                tx.rollback().await?;
                return Err(CouponRejection::UsageLimitReached.into());
            };

            if once_per_customer {
                let used: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM coupon_uses WHERE coupon_id = $1 AND customer_whatsapp = $2",
                )
                .bind(coupon_id)
                .bind(whatsapp)
                .fetch_one(&mut *tx)
                .await?;
                if used > 0 {
                    tx.rollback().await?;
                    return Err(CouponRejection::AlreadyUsed.into());
                }
            }
        }

        let sql = format!(
            r#"
            INSERT INTO order_records (
                order_id, service_id, target_url, quantity, customer_email,
                customer_whatsapp, coupon_id, coupon_code, discount_amount,
                is_express, drip_daily_quantity, total_price, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'pending_payment')
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let record = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(order_id)
            .bind(insert.service_id)
            .bind(insert.draft.target_url.trim())
            .bind(to_i64(insert.draft.quantity))
            .bind(insert.draft.customer_email.as_deref().map(str::trim))
            .bind(whatsapp)
            .bind(insert.coupon_id)
            .bind(coupon_code)
            .bind(insert.discount_amount)
            .bind(insert.draft.is_express)
            .bind(insert.draft.drip_feed.map(|d| to_i64(d.daily_quantity)))
            .bind(insert.total_price)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(coupon_id) = insert.coupon_id {
            sqlx::query(
                r#"
                INSERT INTO coupon_uses (coupon_id, order_id, customer_whatsapp)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(coupon_id)
            .bind(order_id)
            .bind(whatsapp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(record)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetOrderRecordById {
    pub order_id: Uuid,
}

impl Processor<GetOrderRecordById> for DatabaseProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderRecordById")]
    async fn process(&self, query: GetOrderRecordById) -> Result<Option<OrderRecord>, sqlx::Error> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM order_records WHERE order_id = $1");
        sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(query.order_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone, Copy)]
/// Move an order from `from` to `to`. Returns `false` when the order was no
/// longer in `from`, so concurrent transitions apply only once.
pub struct UpdateOrderStatus {
    pub order_id: Uuid,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl Processor<UpdateOrderStatus> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateOrderStatus")]
    async fn process(&self, update: UpdateOrderStatus) -> Result<bool, sqlx::Error> {
        let marks_paid = SdkOrderStatus::from(update.to).implies_payment();
        let result = sqlx::query(
            r#"
            UPDATE order_records
            SET status = $3,
                updated_at = NOW() AT TIME ZONE 'utc',
                paid_at = CASE WHEN $4 AND paid_at IS NULL THEN NOW() AT TIME ZONE 'utc' ELSE paid_at END
            WHERE order_id = $1 AND status = $2
            "#,
        )
        .bind(update.order_id)
        .bind(update.from)
        .bind(update.to)
        .bind(marks_paid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record(status: OrderStatus) -> OrderRecord {
        OrderRecord {
            order_id: Uuid::nil(),
            service_id: 1,
            target_url: "https://instagram.com/someone".to_string(),
            quantity: 1000,
            customer_email: None,
            customer_whatsapp: "+5511999999999".to_string(),
            coupon_id: None,
            coupon_code: None,
            discount_amount: Decimal::ZERO,
            is_express: false,
            drip_daily_quantity: Some(100),
            total_price: Decimal::new(5999, 2),
            status,
            payment_method: None,
            charge_id: None,
            created_at: datetime!(2026-01-01 00:00),
            updated_at: datetime!(2026-01-01 00:00),
            paid_at: None,
        }
    }

    #[test]
    fn test_status_report_reflects_payment() {
        assert!(!record(OrderStatus::PendingPayment).status_report().is_approved());
        assert!(record(OrderStatus::Processing).status_report().is_approved());

        let mut refunded = record(OrderStatus::Refunded);
        assert!(!refunded.payment_approved());
        refunded.paid_at = Some(datetime!(2026-01-01 00:05));
        assert!(refunded.payment_approved());
    }

    #[test]
    fn test_to_response() {
        let response = record(OrderStatus::PendingPayment).to_response();
        assert_eq!(response.quantity, 1000);
        assert_eq!(response.status, SdkOrderStatus::PendingPayment);
        assert_eq!(response.drip_feed, Some(DripFeed { daily_quantity: 100 }));
        assert_eq!(response.created_at, 1_767_225_600);
    }

    #[test]
    fn test_status_conversion_is_lossless() {
        for status in [
            OrderStatus::PendingPayment,
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
            OrderStatus::Partial,
        ] {
            assert_eq!(OrderStatus::from(SdkOrderStatus::from(status)), status);
        }
    }
}
