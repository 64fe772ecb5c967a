//! PaymentSync processor.
//!
//! The PaymentSync is responsible for:
//! - Periodically asking the `PaymentGateway` for the status of every open
//!   charge of an order that is still `pending_payment`
//! - Moving paid orders to `processing` and emitting `OrderEvent::PaymentApproved`
//! - Cancelling orders once every one of their charges was rejected or expired
//!
//! An order collects one charge per payment attempt, and any of them may be
//! the one the customer pays. Each checked charge is stamped, so charges the
//! gateway cannot answer for rotate to the back of the next sweep.
//!
//! The sweep frequency follows [`sync_interval`]: a `ChargeCreated` event
//! resets it to the short interval, and it backs off while nothing new is paid.

use crate::entities::charges::{CountOpenCharges, ListOpenCharges, MarkChargeChecked};
use crate::entities::order_records::{OrderStatus, UpdateOrderStatus};
use crate::events::{ChargeCreatedReceiver, OrderEvent, OrderEventSender};
use crate::framework::{DatabaseProcessor, EntityProcessor};
use crate::gateway::{GatewayError, PaymentGateway};
use crate::utils::now_primitive;
use crate::utils::sync_interval::sync_interval;
use kanau::processor::Processor;
use smm_sdk::objects::ChargeStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Charges checked per sweep.
const SWEEP_BATCH_SIZE: i64 = 100;

/// Order status a charge status leads to, if any.
pub fn transition_for(status: ChargeStatus) -> Option<OrderStatus> {
    match status {
        ChargeStatus::Pending => None,
        ChargeStatus::Approved => Some(OrderStatus::Processing),
        ChargeStatus::Rejected | ChargeStatus::Expired => Some(OrderStatus::Cancelled),
    }
}

/// Apply a gateway charge status to a pending order.
///
/// An approved charge moves the order to `processing` and emits
/// `PaymentApproved`. A rejected or expired charge cancels the order only
/// when no other charge of it is still open. Returns the new status when
/// the order actually moved.
pub async fn apply_charge_status<S: EntityProcessor>(
    db: &S,
    order_events: &OrderEventSender,
    order_id: Uuid,
    status: ChargeStatus,
) -> Result<Option<OrderStatus>, sqlx::Error> {
    let Some(to) = transition_for(status) else {
        return Ok(None);
    };
    if to == OrderStatus::Cancelled {
        let open = db.process(CountOpenCharges { order_id }).await?;
        if open > 0 {
            debug!(order_id = %order_id, open, "Order still has open charges");
            return Ok(None);
        }
    }

    let moved = db
        .process(UpdateOrderStatus {
            order_id,
            from: OrderStatus::PendingPayment,
            to,
        })
        .await?;
    if !moved {
        debug!(order_id = %order_id, "Order already left pending_payment");
        return Ok(None);
    }

    info!(order_id = %order_id, charge_status = %status, new_status = ?to, "Order status updated");
    if to == OrderStatus::Processing
        && let Err(e) = order_events.try_send(OrderEvent::PaymentApproved { order_id })
    {
        warn!(order_id = %order_id, error = %e, "Failed to emit PaymentApproved");
    }
    Ok(Some(to))
}

/// PaymentSync reconciles pending orders with the payment gateway.
pub struct PaymentSync<S = DatabaseProcessor> {
    db: S,
    gateway: Arc<dyn PaymentGateway>,
    order_events: OrderEventSender,
    batch_size: i64,
}

impl<S: EntityProcessor> PaymentSync<S> {
    pub fn new(db: S, gateway: Arc<dyn PaymentGateway>, order_events: OrderEventSender) -> Self {
        Self {
            db,
            gateway,
            order_events,
            batch_size: SWEEP_BATCH_SIZE,
        }
    }

    /// Check at most `batch_size` charges per sweep.
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run the PaymentSync until shutdown is signaled.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut charge_rx: ChargeCreatedReceiver,
    ) {
        info!("PaymentSync started");
        // Orders left pending by a previous run are picked up on the slow interval.
        let mut last_charge_at = time::PrimitiveDateTime::MIN;

        loop {
            let wait = sync_interval(last_charge_at, now_primitive());
            let wait = Duration::try_from(wait).unwrap_or(Duration::from_secs(60));

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("PaymentSync received shutdown signal");
                        break;
                    }
                }

                Some(event) = charge_rx.recv() => {
                    debug!(order_id = %event.order_id, "Received ChargeCreated");
                    last_charge_at = now_primitive();
                }

                _ = tokio::time::sleep(wait) => {
                    match self.sweep().await {
                        Ok(0) => {}
                        Ok(updated) => info!(updated, "PaymentSync sweep updated orders"),
                        Err(e) => error!(error = %e, "PaymentSync sweep failed"),
                    }
                }
            }
        }

        info!("PaymentSync shutdown complete");
    }

    /// Check one batch of open charges. Returns how many orders moved.
    ///
    /// Gateway errors are logged per charge and never stop the sweep; only
    /// database errors abort it.
    pub async fn sweep(&self) -> Result<u32, sqlx::Error> {
        let charges = self
            .db
            .process(ListOpenCharges {
                limit: self.batch_size,
            })
            .await?;

        let mut updated = 0;
        for charge in charges {
            let status = match self.gateway.charge_status(&charge.charge_id).await {
                Ok(status) => status,
                Err(GatewayError::UnknownCharge(id)) => {
                    warn!(order_id = %charge.order_id, charge_id = %id, "Gateway does not know this charge");
                    ChargeStatus::Pending
                }
                Err(e) => {
                    warn!(order_id = %charge.order_id, charge_id = %charge.charge_id, error = %e, "Charge status check failed");
                    ChargeStatus::Pending
                }
            };

            self.db
                .process(MarkChargeChecked {
                    charge_id: charge.charge_id,
                    status: status.into(),
                })
                .await?;
            if apply_charge_status(&self.db, &self.order_events, charge.order_id, status)
                .await?
                .is_some()
            {
                updated += 1;
            }
        }
        Ok(updated)
    }
}
