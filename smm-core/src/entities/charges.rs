use crate::entities::PaymentMethodKind;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use smm_sdk::objects::ChargeStatus;
use uuid::Uuid;

/// Charge status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `smm_sdk::objects::ChargeStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "charge_status")]
pub enum ChargeState {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl From<ChargeStatus> for ChargeState {
    fn from(status: ChargeStatus) -> Self {
        match status {
            ChargeStatus::Pending => ChargeState::Pending,
            ChargeStatus::Approved => ChargeState::Approved,
            ChargeStatus::Rejected => ChargeState::Rejected,
            ChargeStatus::Expired => ChargeState::Expired,
        }
    }
}

impl From<ChargeState> for ChargeStatus {
    fn from(state: ChargeState) -> Self {
        match state {
            ChargeState::Pending => ChargeStatus::Pending,
            ChargeState::Approved => ChargeStatus::Approved,
            ChargeState::Rejected => ChargeStatus::Rejected,
            ChargeState::Expired => ChargeStatus::Expired,
        }
    }
}

/// Every gateway charge ever created for an order. An order can carry
/// several when the customer retries payment.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ChargeRecord {
    pub charge_id: String,
    pub order_id: Uuid,
    pub method: PaymentMethodKind,
    pub status: ChargeState,
    pub created_at: time::PrimitiveDateTime,
    /// Last time the payment sync asked the gateway about this charge.
    pub checked_at: Option<time::PrimitiveDateTime>,
}

#[derive(Debug, Clone)]
/// Record a gateway charge for a pending order and make it the order's
/// current charge. Returns `false` when the order no longer awaits payment.
pub struct AttachCharge {
    pub order_id: Uuid,
    pub charge_id: String,
    pub method: PaymentMethodKind,
    pub status: ChargeState,
}

impl Processor<AttachCharge> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AttachCharge")]
    async fn process(&self, attach: AttachCharge) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE order_records
            SET charge_id = $2, payment_method = $3, updated_at = NOW() AT TIME ZONE 'utc'
            WHERE order_id = $1 AND status = 'pending_payment'
            "#,
        )
        .bind(attach.order_id)
        .bind(&attach.charge_id)
        .bind(attach.method)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO payment_charges (charge_id, order_id, method, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&attach.charge_id)
        .bind(attach.order_id)
        .bind(attach.method)
        .bind(attach.status)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy)]
/// Pending charges of orders still awaiting payment. Charges never checked
/// come first, then the ones checked longest ago.
pub struct ListOpenCharges {
    pub limit: i64,
}

impl Processor<ListOpenCharges> for DatabaseProcessor {
    type Output = Vec<ChargeRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListOpenCharges")]
    async fn process(&self, query: ListOpenCharges) -> Result<Vec<ChargeRecord>, sqlx::Error> {
        sqlx::query_as::<_, ChargeRecord>(
            r#"
            SELECT c.charge_id, c.order_id, c.method, c.status, c.created_at, c.checked_at
            FROM payment_charges c
            JOIN order_records o ON o.order_id = c.order_id
            WHERE c.status = 'pending' AND o.status = 'pending_payment'
            ORDER BY c.checked_at ASC NULLS FIRST, c.created_at ASC
            LIMIT $1
            "#,
        )
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Store the status the gateway last reported and stamp `checked_at`.
/// Charges the gateway could not answer for keep `Pending`.
pub struct MarkChargeChecked {
    pub charge_id: String,
    pub status: ChargeState,
}

impl Processor<MarkChargeChecked> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkChargeChecked")]
    async fn process(&self, update: MarkChargeChecked) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE payment_charges
            SET status = $2, checked_at = NOW() AT TIME ZONE 'utc'
            WHERE charge_id = $1
            "#,
        )
        .bind(update.charge_id)
        .bind(update.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CountOpenCharges {
    pub order_id: Uuid,
}

impl Processor<CountOpenCharges> for DatabaseProcessor {
    type Output = u32;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountOpenCharges")]
    async fn process(&self, query: CountOpenCharges) -> Result<u32, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payment_charges WHERE order_id = $1 AND status = 'pending'",
        )
        .bind(query.order_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_state_conversion_is_lossless() {
        for status in [
            ChargeStatus::Pending,
            ChargeStatus::Approved,
            ChargeStatus::Rejected,
            ChargeStatus::Expired,
        ] {
            assert_eq!(ChargeStatus::from(ChargeState::from(status)), status);
        }
    }
}
