//! Application state shared across all request handlers.

use smm_core::config::{ConfigStore, StoreSettings};
use smm_core::events::EventSenders;
use smm_core::framework::DatabaseProcessor;
use smm_core::gateway::PaymentGateway;
use sqlx::PgPool;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// Cloning is cheap: every field is a handle.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Store settings, replaced on SIGHUP.
    pub settings: ConfigStore<StoreSettings>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub events: EventSenders,
}

impl AppState {
    pub fn new(
        db: PgPool,
        settings: ConfigStore<StoreSettings>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSenders,
    ) -> Self {
        Self {
            db,
            settings,
            gateway,
            events,
        }
    }

    pub fn processor(&self) -> DatabaseProcessor {
        DatabaseProcessor::new(self.db.clone())
    }
}
