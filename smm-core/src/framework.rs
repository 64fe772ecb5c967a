use crate::entities::charges::{
    AttachCharge, ChargeRecord, CountOpenCharges, ListOpenCharges, MarkChargeChecked,
};
use crate::entities::coupons::{CountCouponUsesByCustomer, CouponRecord, GetCouponByCode};
use crate::entities::order_records::{
    CreateOrderError, CreateOrderRecord, GetOrderRecordById, OrderRecord, UpdateOrderStatus,
};
use crate::entities::services::{GetServiceById, ListActiveServices, ServiceRecord};
use kanau::processor::Processor;
use sqlx::PgPool;

/// Executes the entity queries in [`crate::entities`].
///
/// Each query is a plain struct with a `kanau::processor::Processor` impl
/// on this type, so handlers read as `processor.process(Query { .. })`.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Runs every entity query the checkout needs.
///
/// Implemented for [`DatabaseProcessor`] and, with the `test-utils`
/// feature, for the in-memory `testing::MemoryStore`.
pub trait EntityProcessor:
    Processor<ListActiveServices, Output = Vec<ServiceRecord>, Error = sqlx::Error>
    + Processor<GetServiceById, Output = Option<ServiceRecord>, Error = sqlx::Error>
    + Processor<GetCouponByCode, Output = Option<CouponRecord>, Error = sqlx::Error>
    + Processor<CountCouponUsesByCustomer, Output = u32, Error = sqlx::Error>
    + Processor<CreateOrderRecord, Output = OrderRecord, Error = CreateOrderError>
    + Processor<GetOrderRecordById, Output = Option<OrderRecord>, Error = sqlx::Error>
    + Processor<UpdateOrderStatus, Output = bool, Error = sqlx::Error>
    + Processor<AttachCharge, Output = bool, Error = sqlx::Error>
    + Processor<ListOpenCharges, Output = Vec<ChargeRecord>, Error = sqlx::Error>
    + Processor<MarkChargeChecked, Output = (), Error = sqlx::Error>
    + Processor<CountOpenCharges, Output = u32, Error = sqlx::Error>
    + Send
    + Sync
    + 'static
{
}

impl<T> EntityProcessor for T where
    T: Processor<ListActiveServices, Output = Vec<ServiceRecord>, Error = sqlx::Error>
        + Processor<GetServiceById, Output = Option<ServiceRecord>, Error = sqlx::Error>
        + Processor<GetCouponByCode, Output = Option<CouponRecord>, Error = sqlx::Error>
        + Processor<CountCouponUsesByCustomer, Output = u32, Error = sqlx::Error>
        + Processor<CreateOrderRecord, Output = OrderRecord, Error = CreateOrderError>
        + Processor<GetOrderRecordById, Output = Option<OrderRecord>, Error = sqlx::Error>
        + Processor<UpdateOrderStatus, Output = bool, Error = sqlx::Error>
        + Processor<AttachCharge, Output = bool, Error = sqlx::Error>
        + Processor<ListOpenCharges, Output = Vec<ChargeRecord>, Error = sqlx::Error>
        + Processor<MarkChargeChecked, Output = (), Error = sqlx::Error>
        + Processor<CountOpenCharges, Output = u32, Error = sqlx::Error>
        + Send
        + Sync
        + 'static
{
}
