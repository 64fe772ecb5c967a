//! NotificationSender processor.
//!
//! The NotificationSender is responsible for:
//! - Receiving `OrderEvent` from the queue
//! - Building a `NotificationPayload` from the stored order
//! - POSTing the signed payload to the configured notification webhook
//! - Retrying failed deliveries in memory with exponential backoff
//!
//! Delivery never affects the order itself. When no webhook is configured,
//! events are logged and dropped.

use crate::config::{ConfigStore, ConfigWatcher, NotificationConfig, StoreSettings};
use crate::entities::order_records::{GetOrderRecordById, OrderRecord};
use crate::entities::to_u64;
use crate::events::{OrderEvent, OrderEventReceiver};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use smm_sdk::objects::NotificationPayload;
use smm_sdk::signature::{SIGNATURE_HEADER, SignedObject};
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Maximum retry attempts (2^8 = 256 seconds max backoff)
pub const MAX_RETRY_COUNT: u32 = 8;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("notification delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NotificationError {
    /// Missing orders will not appear on retry.
    fn is_retryable(&self) -> bool {
        !matches!(
            self,
            NotificationError::OrderNotFound(_) | NotificationError::Serialization(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingDelivery {
    event: OrderEvent,
    attempts: u32,
    due: Instant,
}

/// Failed deliveries waiting for their next attempt.
#[derive(Debug, Default)]
struct RetryQueue {
    pending: VecDeque<PendingDelivery>,
}

impl RetryQueue {
    /// Schedule another attempt after `attempts` failures. Returns `false`
    /// once the event has exhausted its retries.
    fn schedule(&mut self, event: OrderEvent, attempts: u32, now: Instant) -> bool {
        if attempts > MAX_RETRY_COUNT {
            return false;
        }
        let due = now + calculate_retry_delay(attempts.saturating_sub(1));
        self.pending.push_back(PendingDelivery {
            event,
            attempts,
            due,
        });
        true
    }

    fn next_due(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.due).min()
    }

    fn take_due(&mut self, now: Instant) -> Vec<PendingDelivery> {
        let (due, waiting): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = waiting.into();
        due
    }

    fn len(&self) -> usize {
        self.pending.len()
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

/// NotificationSender delivers order notifications to the store's webhook.
pub struct NotificationSender {
    db: DatabaseProcessor,
    settings: ConfigStore<StoreSettings>,
    config_watcher: ConfigWatcher,
    event_rx: OrderEventReceiver,
    shutdown_rx: watch::Receiver<bool>,
    http_client: reqwest::Client,
    retries: RetryQueue,
}

impl NotificationSender {
    pub fn new(
        db: DatabaseProcessor,
        settings: ConfigStore<StoreSettings>,
        event_rx: OrderEventReceiver,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            db,
            config_watcher: settings.subscribe(),
            settings,
            event_rx,
            shutdown_rx,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            retries: RetryQueue::default(),
        }
    }

    /// Run the NotificationSender.
    pub async fn run(mut self) {
        info!("NotificationSender started");

        loop {
            let next_retry = self.retries.next_due();
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("NotificationSender received shutdown signal");
                        break;
                    }
                }

                Ok(()) = self.config_watcher.changed() => {
                    if self.settings.read().await.notifications.is_none() && self.retries.len() > 0 {
                        info!(
                            dropped = self.retries.len(),
                            "Notifications disabled, clearing retry queue"
                        );
                        self.retries.clear();
                    }
                }

                Some(event) = self.event_rx.recv() => {
                    debug!(event = ?event, "Received OrderEvent");
                    self.attempt(event, 0).await;
                }

                _ = tokio::time::sleep_until(next_retry.unwrap_or_else(Instant::now)), if next_retry.is_some() => {
                    for pending in self.retries.take_due(Instant::now()) {
                        self.attempt(pending.event, pending.attempts).await;
                    }
                }

                else => {
                    info!("OrderEvent channel closed");
                    break;
                }
            }
        }

        if self.retries.len() > 0 {
            warn!(
                pending = self.retries.len(),
                "Dropping undelivered notifications on shutdown"
            );
        }
        info!("NotificationSender shutdown complete");
    }

    /// Try one delivery. `attempts` counts earlier failures.
    async fn attempt(&mut self, event: OrderEvent, attempts: u32) {
        let order_id = event.order_id();
        let Some(config) = self.settings.read().await.notifications.clone() else {
            debug!(order_id = %order_id, kind = %event.kind(), "Notifications disabled, dropping event");
            return;
        };

        match self.deliver(event, &config).await {
            Ok(()) => {
                info!(order_id = %order_id, kind = %event.kind(), "Notification delivered");
            }
            Err(e) if e.is_retryable() => {
                let attempts = attempts + 1;
                if self.retries.schedule(event, attempts, Instant::now()) {
                    warn!(
                        order_id = %order_id,
                        error = %e,
                        retry_count = attempts,
                        "Notification delivery failed, will retry"
                    );
                } else {
                    error!(
                        order_id = %order_id,
                        error = %e,
                        "Notification delivery failed, giving up"
                    );
                }
            }
            Err(e) => {
                error!(order_id = %order_id, error = %e, "Failed to process OrderEvent");
            }
        }
    }

    async fn deliver(
        &self,
        event: OrderEvent,
        config: &NotificationConfig,
    ) -> Result<(), NotificationError> {
        let order_id = event.order_id();
        let Some(order) = self.db.process(GetOrderRecordById { order_id }).await? else {
            return Err(NotificationError::OrderNotFound(order_id));
        };
        let payload = build_payload(
            event,
            &order,
            time::OffsetDateTime::now_utc().unix_timestamp(),
        );
        let signed = SignedObject::new(payload, &config.secret)?;

        let response = self
            .http_client
            .post(config.webhook_url.clone())
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(signed.json)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotificationError::DeliveryFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Build the notification body for `event` from the stored order.
pub fn build_payload(event: OrderEvent, order: &OrderRecord, timestamp: i64) -> NotificationPayload {
    NotificationPayload {
        event_type: event.kind(),
        order_id: order.order_id,
        service_id: order.service_id,
        quantity: to_u64(order.quantity),
        total_price: order.total_price,
        status: order.status.into(),
        customer_whatsapp: order.customer_whatsapp.clone(),
        customer_email: order.customer_email.clone(),
        timestamp,
    }
}

/// Calculate the next retry delay based on retry count.
///
/// Uses exponential backoff: 2^retry_count seconds.
pub fn calculate_retry_delay(retry_count: u32) -> Duration {
    let seconds = 2u64.pow(retry_count.min(MAX_RETRY_COUNT));
    Duration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order_records::OrderStatus;
    use rust_decimal::Decimal;
    use smm_sdk::objects::{NotificationKind, OrderStatus as SdkOrderStatus};
    use time::macros::datetime;

    #[test]
    fn test_retry_delay_calculation() {
        assert_eq!(calculate_retry_delay(0), Duration::from_secs(1));
        assert_eq!(calculate_retry_delay(3), Duration::from_secs(8));
        assert_eq!(calculate_retry_delay(8), Duration::from_secs(256));
        assert_eq!(calculate_retry_delay(9), Duration::from_secs(256));
        assert_eq!(calculate_retry_delay(100), Duration::from_secs(256));
    }

    #[test]
    fn test_retry_queue_orders_by_due_time() {
        let now = Instant::now();
        let first = OrderEvent::Created {
            order_id: Uuid::from_u128(1),
        };
        let second = OrderEvent::PaymentApproved {
            order_id: Uuid::from_u128(2),
        };
        let mut queue = RetryQueue::default();
        assert_eq!(queue.next_due(), None);

        assert!(queue.schedule(first, 3, now));
        assert!(queue.schedule(second, 1, now));
        assert_eq!(queue.next_due(), Some(now + Duration::from_secs(1)));

        let due = queue.take_due(now + Duration::from_secs(1));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].event, second);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_due(), Some(now + Duration::from_secs(4)));
    }

    #[test]
    fn test_retry_queue_gives_up() {
        let mut queue = RetryQueue::default();
        let event = OrderEvent::Created {
            order_id: Uuid::nil(),
        };
        assert!(queue.schedule(event, MAX_RETRY_COUNT, Instant::now()));
        assert!(!queue.schedule(event, MAX_RETRY_COUNT + 1, Instant::now()));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_build_payload() {
        let order = OrderRecord {
            order_id: Uuid::from_u128(42),
            service_id: 3,
            target_url: "https://tiktok.com/@someone".to_string(),
            quantity: 2500,
            customer_email: Some("buyer@example.com".to_string()),
            customer_whatsapp: "+5511988887777".to_string(),
            coupon_id: None,
            coupon_code: None,
            discount_amount: Decimal::ZERO,
            is_express: true,
            drip_daily_quantity: None,
            total_price: Decimal::new(3450, 2),
            status: OrderStatus::Processing,
            payment_method: None,
            charge_id: Some("sbx_1".to_string()),
            created_at: datetime!(2026-03-01 12:00),
            updated_at: datetime!(2026-03-01 12:01),
            paid_at: Some(datetime!(2026-03-01 12:01)),
        };
        let event = OrderEvent::PaymentApproved {
            order_id: order.order_id,
        };
        let payload = build_payload(event, &order, 1_700_000_000);
        assert_eq!(payload.event_type, NotificationKind::PaymentApproved);
        assert_eq!(payload.quantity, 2500);
        assert_eq!(payload.status, SdkOrderStatus::Processing);
        assert_eq!(payload.customer_email.as_deref(), Some("buyer@example.com"));
        assert_eq!(payload.timestamp, 1_700_000_000);
    }
}
