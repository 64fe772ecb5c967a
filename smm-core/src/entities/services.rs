use crate::entities::to_u64;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use smm_sdk::objects::Service;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ServiceRecord {
    pub id: i64,
    pub name: String,
    pub platform: String,
    pub service_type: String,
    pub price_per_thousand: rust_decimal::Decimal,
    pub min_quantity: i64,
    pub max_quantity: i64,
    pub default_quantity: i64,
    pub active: bool,
}

impl ServiceRecord {
    /// Convert into the catalog DTO. Express eligibility comes from the
    /// global store settings.
    pub fn into_service(self, express_enabled: bool) -> Service {
        Service {
            id: self.id,
            name: self.name,
            platform: self.platform,
            service_type: self.service_type,
            price_per_thousand: self.price_per_thousand,
            min_quantity: to_u64(self.min_quantity),
            max_quantity: to_u64(self.max_quantity),
            default_quantity: to_u64(self.default_quantity),
            is_express_eligible: express_enabled,
        }
    }
}

#[derive(Debug, Clone, Copy)]
/// List every active catalog entry, grouped by platform.
pub struct ListActiveServices;

impl Processor<ListActiveServices> for DatabaseProcessor {
    type Output = Vec<ServiceRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListActiveServices")]
    async fn process(&self, _: ListActiveServices) -> Result<Vec<ServiceRecord>, sqlx::Error> {
        sqlx::query_as::<_, ServiceRecord>(
            r#"
            SELECT id, name, platform, service_type, price_per_thousand,
                   min_quantity, max_quantity, default_quantity, active
            FROM services
            WHERE active
            ORDER BY platform, service_type, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
/// Fetch an active service by id.
pub struct GetServiceById {
    pub service_id: i64,
}

impl Processor<GetServiceById> for DatabaseProcessor {
    type Output = Option<ServiceRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetServiceById")]
    async fn process(&self, query: GetServiceById) -> Result<Option<ServiceRecord>, sqlx::Error> {
        sqlx::query_as::<_, ServiceRecord>(
            r#"
            SELECT id, name, platform, service_type, price_per_thousand,
                   min_quantity, max_quantity, default_quantity, active
            FROM services
            WHERE id = $1 AND active
            "#,
        )
        .bind(query.service_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_into_service_applies_express_setting() {
        let record = ServiceRecord {
            id: 2,
            name: "YouTube Views".to_string(),
            platform: "youtube".to_string(),
            service_type: "views".to_string(),
            price_per_thousand: Decimal::new(1290, 2),
            min_quantity: 500,
            max_quantity: 1_000_000,
            default_quantity: 1000,
            active: true,
        };
        let service = record.clone().into_service(true);
        assert!(service.is_express_eligible);
        assert_eq!(service.min_quantity, 500);
        assert!(service.check_bounds().is_ok());

        assert!(!record.into_service(false).is_express_eligible);
    }
}
