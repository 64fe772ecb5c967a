use crate::coupons::{CouponRule, DiscountKind};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "discount_type")]
pub enum DiscountType {
    Percent,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CouponRecord {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub active: bool,
    pub expires_at: Option<time::PrimitiveDateTime>,
    pub max_uses: Option<i32>,
    pub uses: i32,
    pub once_per_customer: bool,
    pub service_ids: Vec<i64>,
    pub min_order_value: Option<Decimal>,
}

impl From<CouponRecord> for CouponRule {
    fn from(record: CouponRecord) -> Self {
        let discount = match record.discount_type {
            DiscountType::Percent => DiscountKind::Percent(record.discount_value),
            DiscountType::Fixed => DiscountKind::Fixed(record.discount_value),
        };
        CouponRule {
            id: record.id,
            code: record.code,
            name: record.name,
            discount,
            active: record.active,
            expires_at: record.expires_at,
            max_uses: record.max_uses.map(|max| u32::try_from(max).unwrap_or_default()),
            uses: u32::try_from(record.uses).unwrap_or_default(),
            once_per_customer: record.once_per_customer,
            service_ids: record.service_ids,
            min_order_value: record.min_order_value,
        }
    }
}

#[derive(Debug, Clone)]
/// Look up a coupon by code, case-insensitively.
pub struct GetCouponByCode {
    pub code: String,
}

impl Processor<GetCouponByCode> for DatabaseProcessor {
    type Output = Option<CouponRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetCouponByCode")]
    async fn process(&self, query: GetCouponByCode) -> Result<Option<CouponRecord>, sqlx::Error> {
        sqlx::query_as::<_, CouponRecord>(
            r#"
            SELECT id, code, name, discount_type, discount_value, active, expires_at,
                   max_uses, uses, once_per_customer, service_ids, min_order_value
            FROM coupons
            WHERE UPPER(TRIM(code)) = UPPER(TRIM($1))
            "#,
        )
        .bind(query.code)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct CountCouponUsesByCustomer {
    pub coupon_id: i64,
    pub customer_whatsapp: String,
}

impl Processor<CountCouponUsesByCustomer> for DatabaseProcessor {
    type Output = u32;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountCouponUsesByCustomer")]
    async fn process(&self, query: CountCouponUsesByCustomer) -> Result<u32, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM coupon_uses
            WHERE coupon_id = $1 AND customer_whatsapp = $2
            "#,
        )
        .bind(query.coupon_id)
        .bind(query.customer_whatsapp.trim())
        .fetch_one(&self.pool)
        .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_into_rule() {
        let record = CouponRecord {
            id: 7,
            code: "WELCOME10".to_string(),
            name: "Welcome".to_string(),
            discount_type: DiscountType::Percent,
            discount_value: Decimal::TEN,
            active: true,
            expires_at: None,
            max_uses: Some(-1),
            uses: 3,
            once_per_customer: true,
            service_ids: vec![1, 2],
            min_order_value: None,
        };
        let rule = CouponRule::from(record);
        assert_eq!(rule.discount, DiscountKind::Percent(Decimal::TEN));
        assert_eq!(rule.max_uses, Some(0));
        assert_eq!(rule.uses, 3);
        assert_eq!(rule.service_ids, vec![1, 2]);
    }
}
