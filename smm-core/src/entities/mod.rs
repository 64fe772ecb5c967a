pub mod charges;
pub mod coupons;
pub mod order_records;
pub mod services;

use smm_sdk::objects::PaymentMethod as SdkPaymentMethod;

/// Payment method for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `smm_sdk::objects::PaymentMethod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "payment_method")]
pub enum PaymentMethodKind {
    Pix,
    Card,
}

impl From<PaymentMethodKind> for SdkPaymentMethod {
    fn from(value: PaymentMethodKind) -> Self {
        match value {
            PaymentMethodKind::Pix => SdkPaymentMethod::Pix,
            PaymentMethodKind::Card => SdkPaymentMethod::Card,
        }
    }
}

impl From<SdkPaymentMethod> for PaymentMethodKind {
    fn from(value: SdkPaymentMethod) -> Self {
        match value {
            SdkPaymentMethod::Pix => PaymentMethodKind::Pix,
            SdkPaymentMethod::Card => PaymentMethodKind::Card,
        }
    }
}

/// Convert a `BIGINT` count column to `u64`, treating negatives as zero.
pub(crate) fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Convert a `u64` quantity to a `BIGINT`, saturating at `i64::MAX`.
pub(crate) fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
