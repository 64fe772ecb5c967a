//! Service catalog entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A purchasable engagement package (followers, likes, views, ...).
///
/// Catalog entries are read-only for the checkout. `is_express_eligible`
/// is not stored with the service; the server derives it from the global
/// store settings before handing the entry out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    /// Social network the package targets, e.g. `instagram`.
    pub platform: String,
    /// Kind of engagement, e.g. `followers`.
    pub service_type: String,
    pub price_per_thousand: Decimal,
    pub min_quantity: u64,
    pub max_quantity: u64,
    pub default_quantity: u64,
    #[serde(default)]
    pub is_express_eligible: bool,
}

/// Store-wide checkout options handed to the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontSettings {
    pub express_enabled: bool,
    /// Surcharge, in percent, for express orders. Zero when express is off.
    pub express_fee_percent: Decimal,
    /// Seconds between two payment status checks.
    pub poll_interval_secs: u64,
    /// Seconds after which the checkout stops waiting for a payment.
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("service {service_id} has inconsistent bounds: min {min}, default {default}, max {max}")]
pub struct ServiceBoundsError {
    pub service_id: i64,
    pub min: u64,
    pub default: u64,
    pub max: u64,
}

impl Service {
    /// Check `min_quantity <= default_quantity <= max_quantity`.
    pub fn check_bounds(&self) -> Result<(), ServiceBoundsError> {
        if self.min_quantity <= self.default_quantity && self.default_quantity <= self.max_quantity
        {
            Ok(())
        } else {
            Err(ServiceBoundsError {
                service_id: self.id,
                min: self.min_quantity,
                default: self.default_quantity,
                max: self.max_quantity,
            })
        }
    }

    /// Whether `quantity` lies inside `[min_quantity, max_quantity]`.
    pub fn accepts_quantity(&self, quantity: u64) -> bool {
        (self.min_quantity..=self.max_quantity).contains(&quantity)
    }
}
