//! In-memory [`EntityProcessor`](crate::framework::EntityProcessor) for tests.
//!
//! Mirrors the SQL in [`crate::entities`] closely enough to exercise the
//! handlers and processors without a database: coupon guards, charge
//! ordering and conditional status updates behave the same way.

use crate::coupons::CouponRejection;
use crate::entities::charges::{
    AttachCharge, ChargeRecord, ChargeState, CountOpenCharges, ListOpenCharges, MarkChargeChecked,
};
use crate::entities::coupons::{CountCouponUsesByCustomer, CouponRecord, GetCouponByCode};
use crate::entities::order_records::{
    CreateOrderError, CreateOrderRecord, GetOrderRecordById, OrderRecord, OrderStatus,
    UpdateOrderStatus,
};
use crate::entities::services::{GetServiceById, ListActiveServices, ServiceRecord};
use crate::entities::to_i64;
use crate::utils::now_primitive;
use kanau::processor::Processor;
use smm_sdk::objects::OrderStatus as SdkOrderStatus;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponUse {
    pub coupon_id: i64,
    pub order_id: Uuid,
    pub customer_whatsapp: String,
}

#[derive(Debug, Default)]
struct Tables {
    services: Vec<ServiceRecord>,
    coupons: Vec<CouponRecord>,
    coupon_uses: Vec<CouponUse>,
    orders: Vec<OrderRecord>,
    charges: Vec<ChargeRecord>,
}

/// Shared in-memory tables. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_service(&self, service: ServiceRecord) {
        self.tables.lock().await.services.push(service);
    }

    pub async fn insert_coupon(&self, coupon: CouponRecord) {
        self.tables.lock().await.coupons.push(coupon);
    }

    pub async fn coupon(&self, coupon_id: i64) -> Option<CouponRecord> {
        let tables = self.tables.lock().await;
        tables.coupons.iter().find(|c| c.id == coupon_id).cloned()
    }

    pub async fn coupon_uses(&self) -> Vec<CouponUse> {
        self.tables.lock().await.coupon_uses.clone()
    }

    pub async fn orders(&self) -> Vec<OrderRecord> {
        self.tables.lock().await.orders.clone()
    }

    pub async fn order(&self, order_id: Uuid) -> Option<OrderRecord> {
        let tables = self.tables.lock().await;
        tables.orders.iter().find(|o| o.order_id == order_id).cloned()
    }

    pub async fn charges(&self, order_id: Uuid) -> Vec<ChargeRecord> {
        let tables = self.tables.lock().await;
        tables
            .charges
            .iter()
            .filter(|c| c.order_id == order_id)
            .cloned()
            .collect()
    }
}

impl Processor<ListActiveServices> for MemoryStore {
    type Output = Vec<ServiceRecord>;
    type Error = sqlx::Error;
    async fn process(&self, _: ListActiveServices) -> Result<Vec<ServiceRecord>, sqlx::Error> {
        let tables = self.tables.lock().await;
        Ok(tables.services.iter().filter(|s| s.active).cloned().collect())
    }
}

impl Processor<GetServiceById> for MemoryStore {
    type Output = Option<ServiceRecord>;
    type Error = sqlx::Error;
    async fn process(&self, query: GetServiceById) -> Result<Option<ServiceRecord>, sqlx::Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .services
            .iter()
            .find(|s| s.id == query.service_id && s.active)
            .cloned())
    }
}

impl Processor<GetCouponByCode> for MemoryStore {
    type Output = Option<CouponRecord>;
    type Error = sqlx::Error;
    async fn process(&self, query: GetCouponByCode) -> Result<Option<CouponRecord>, sqlx::Error> {
        let code = query.code.trim().to_uppercase();
        let tables = self.tables.lock().await;
        Ok(tables
            .coupons
            .iter()
            .find(|c| c.code.trim().to_uppercase() == code)
            .cloned())
    }
}

impl Processor<CountCouponUsesByCustomer> for MemoryStore {
    type Output = u32;
    type Error = sqlx::Error;
    async fn process(&self, query: CountCouponUsesByCustomer) -> Result<u32, sqlx::Error> {
        let whatsapp = query.customer_whatsapp.trim();
        let tables = self.tables.lock().await;
        let count = tables
            .coupon_uses
            .iter()
            .filter(|u| u.coupon_id == query.coupon_id && u.customer_whatsapp == whatsapp)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

impl Processor<CreateOrderRecord> for MemoryStore {
    type Output = OrderRecord;
    type Error = CreateOrderError;
    async fn process(&self, insert: CreateOrderRecord) -> Result<OrderRecord, CreateOrderError> {
        let order_id = Uuid::now_v7();
        let whatsapp = insert.draft.customer_whatsapp.trim().to_string();
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;

        if let Some(coupon_id) = insert.coupon_id {
            let used_before = tables
                .coupon_uses
                .iter()
                .any(|u| u.coupon_id == coupon_id && u.customer_whatsapp == whatsapp);
            let coupon = tables
                .coupons
                .iter_mut()
                .find(|c| c.id == coupon_id)
                .ok_or(sqlx::Error::RowNotFound)?;
            if coupon.max_uses.is_some_and(|max| coupon.uses >= max) {
                return Err(CouponRejection::UsageLimitReached.into());
            }
            if coupon.once_per_customer && used_before {
                return Err(CouponRejection::AlreadyUsed.into());
            }
            coupon.uses += 1;
            tables.coupon_uses.push(CouponUse {
                coupon_id,
                order_id,
                customer_whatsapp: whatsapp.clone(),
            });
        }

        let now = now_primitive();
        let record = OrderRecord {
            order_id,
            service_id: insert.service_id,
            target_url: insert.draft.target_url.trim().to_string(),
            quantity: to_i64(insert.draft.quantity),
            customer_email: insert
                .draft
                .customer_email
                .as_deref()
                .map(|e| e.trim().to_string()),
            customer_whatsapp: whatsapp,
            coupon_id: insert.coupon_id,
            coupon_code: insert
                .coupon_id
                .and_then(|_| insert.draft.coupon_code().map(str::to_uppercase)),
            discount_amount: insert.discount_amount,
            is_express: insert.draft.is_express,
            drip_daily_quantity: insert.draft.drip_feed.map(|d| to_i64(d.daily_quantity)),
            total_price: insert.total_price,
            status: OrderStatus::PendingPayment,
            payment_method: None,
            charge_id: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };
        tables.orders.push(record.clone());
        Ok(record)
    }
}

impl Processor<GetOrderRecordById> for MemoryStore {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    async fn process(&self, query: GetOrderRecordById) -> Result<Option<OrderRecord>, sqlx::Error> {
        Ok(self.order(query.order_id).await)
    }
}

impl Processor<UpdateOrderStatus> for MemoryStore {
    type Output = bool;
    type Error = sqlx::Error;
    async fn process(&self, update: UpdateOrderStatus) -> Result<bool, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let Some(order) = tables
            .orders
            .iter_mut()
            .find(|o| o.order_id == update.order_id && o.status == update.from)
        else {
            return Ok(false);
        };
        let now = now_primitive();
        order.status = update.to;
        order.updated_at = now;
        if SdkOrderStatus::from(update.to).implies_payment() && order.paid_at.is_none() {
            order.paid_at = Some(now);
        }
        Ok(true)
    }
}

impl Processor<AttachCharge> for MemoryStore {
    type Output = bool;
    type Error = sqlx::Error;
    async fn process(&self, attach: AttachCharge) -> Result<bool, sqlx::Error> {
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;
        let Some(order) = tables
            .orders
            .iter_mut()
            .find(|o| o.order_id == attach.order_id && o.status == OrderStatus::PendingPayment)
        else {
            return Ok(false);
        };
        let now = now_primitive();
        order.charge_id = Some(attach.charge_id.clone());
        order.payment_method = Some(attach.method);
        order.updated_at = now;
        tables.charges.push(ChargeRecord {
            charge_id: attach.charge_id,
            order_id: attach.order_id,
            method: attach.method,
            status: attach.status,
            created_at: now,
            checked_at: None,
        });
        Ok(true)
    }
}

impl Processor<ListOpenCharges> for MemoryStore {
    type Output = Vec<ChargeRecord>;
    type Error = sqlx::Error;
    async fn process(&self, query: ListOpenCharges) -> Result<Vec<ChargeRecord>, sqlx::Error> {
        let tables = self.tables.lock().await;
        let mut open: Vec<ChargeRecord> = tables
            .charges
            .iter()
            .filter(|c| c.status == ChargeState::Pending)
            .filter(|c| {
                tables
                    .orders
                    .iter()
                    .any(|o| o.order_id == c.order_id && o.status == OrderStatus::PendingPayment)
            })
            .cloned()
            .collect();
        // `None < Some(_)` matches `NULLS FIRST`; the sort is stable for ties.
        open.sort_by_key(|c| (c.checked_at, c.created_at));
        open.truncate(usize::try_from(query.limit).unwrap_or_default());
        Ok(open)
    }
}

impl Processor<MarkChargeChecked> for MemoryStore {
    type Output = ();
    type Error = sqlx::Error;
    async fn process(&self, update: MarkChargeChecked) -> Result<(), sqlx::Error> {
        let mut tables = self.tables.lock().await;
        if let Some(charge) = tables
            .charges
            .iter_mut()
            .find(|c| c.charge_id == update.charge_id)
        {
            charge.status = update.status;
            charge.checked_at = Some(now_primitive());
        }
        Ok(())
    }
}

impl Processor<CountOpenCharges> for MemoryStore {
    type Output = u32;
    type Error = sqlx::Error;
    async fn process(&self, query: CountOpenCharges) -> Result<u32, sqlx::Error> {
        let tables = self.tables.lock().await;
        let count = tables
            .charges
            .iter()
            .filter(|c| c.order_id == query.order_id && c.status == ChargeState::Pending)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::coupons::DiscountType;
    use rust_decimal::Decimal;
    use smm_sdk::objects::OrderDraft;

    fn limited_coupon(max_uses: Option<i32>, once_per_customer: bool) -> CouponRecord {
        CouponRecord {
            id: 1,
            code: "LIMITED".to_string(),
            name: "Limited".to_string(),
            discount_type: DiscountType::Fixed,
            discount_value: Decimal::ONE,
            active: true,
            expires_at: None,
            max_uses,
            uses: 0,
            once_per_customer,
            service_ids: vec![],
            min_order_value: None,
        }
    }

    fn insert(whatsapp: &str) -> CreateOrderRecord {
        CreateOrderRecord {
            service_id: 1,
            draft: OrderDraft {
                target_url: "https://instagram.com/someone".to_string(),
                quantity: 1000,
                customer_whatsapp: whatsapp.to_string(),
                coupon_code: Some("LIMITED".to_string()),
                ..OrderDraft::default()
            },
            coupon_id: Some(1),
            discount_amount: Decimal::ONE,
            total_price: Decimal::from(9),
        }
    }

    #[tokio::test]
    async fn test_coupon_limit_is_enforced_at_insert() {
        let store = MemoryStore::new();
        store.insert_coupon(limited_coupon(Some(1), false)).await;

        store.process(insert("+5511911111111")).await.unwrap();
        let err = store.process(insert("+5511922222222")).await.unwrap_err();
        assert!(matches!(
            err,
            CreateOrderError::Coupon(CouponRejection::UsageLimitReached)
        ));
        assert_eq!(store.coupon(1).await.unwrap().uses, 1);
        assert_eq!(store.orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_once_per_customer_is_enforced_at_insert() {
        let store = MemoryStore::new();
        store.insert_coupon(limited_coupon(None, true)).await;

        store.process(insert("+5511911111111")).await.unwrap();
        let err = store.process(insert(" +5511911111111 ")).await.unwrap_err();
        assert!(matches!(
            err,
            CreateOrderError::Coupon(CouponRejection::AlreadyUsed)
        ));
        store.process(insert("+5511922222222")).await.unwrap();
        assert_eq!(store.coupon_uses().await.len(), 2);
    }
}
