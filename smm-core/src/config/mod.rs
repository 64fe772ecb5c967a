//! Runtime store settings shared by the checkout, the HTTP handlers and the
//! background processors.
//!
//! Loading/parsing the settings file is handled by the server crate; this
//! module only holds the validated values.

mod config_store;

pub use config_store::{ConfigStore, ConfigWatcher};

use crate::poller::PollConfig;
use rust_decimal::Decimal;
use smm_sdk::objects::StorefrontSettings;
use std::time::Duration;
use url::Url;

/// Global storefront settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Whether the express priority upgrade is offered at all.
    pub express_enabled: bool,
    /// Surcharge, in percent, applied to express orders.
    pub express_fee_percent: Decimal,
    /// Where order notifications are posted. `None` disables them.
    pub notifications: Option<NotificationConfig>,
    /// Client-side payment confirmation polling.
    pub poll: PollConfig,
}

/// Destination for order notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub webhook_url: Url,
    /// HMAC secret used to sign notification bodies.
    pub secret: Box<[u8]>,
}

impl StoreSettings {
    /// Express surcharge to charge. Zero when express is disabled.
    pub fn express_fee(&self) -> Decimal {
        if self.express_enabled {
            self.express_fee_percent.max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        }
    }

    /// The subset of the settings a checkout client needs.
    pub fn storefront(&self) -> StorefrontSettings {
        StorefrontSettings {
            express_enabled: self.express_enabled,
            express_fee_percent: self.express_fee(),
            poll_interval_secs: self.poll.interval.as_secs(),
            poll_timeout_secs: self.poll.timeout.as_secs(),
        }
    }
}

/// Settings for a client-side checkout. Notifications stay server-side.
impl From<StorefrontSettings> for StoreSettings {
    fn from(settings: StorefrontSettings) -> Self {
        Self {
            express_enabled: settings.express_enabled,
            express_fee_percent: settings.express_fee_percent,
            notifications: None,
            poll: PollConfig {
                interval: Duration::from_secs(settings.poll_interval_secs),
                timeout: Duration::from_secs(settings.poll_timeout_secs),
            },
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            express_enabled: false,
            express_fee_percent: Decimal::ZERO,
            notifications: None,
            poll: PollConfig::default(),
        }
    }
}
