use super::types::{ChargeCreated, OrderEvent};
use tokio::sync::mpsc;

/// Default buffer size for event channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

pub type OrderEventSender = mpsc::Sender<OrderEvent>;
pub type OrderEventReceiver = mpsc::Receiver<OrderEvent>;

pub type ChargeCreatedSender = mpsc::Sender<ChargeCreated>;
pub type ChargeCreatedReceiver = mpsc::Receiver<ChargeCreated>;

/// Create a new OrderEvent channel. The receiver belongs to the `NotificationSender`.
pub fn order_event_channel() -> (OrderEventSender, OrderEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new ChargeCreated channel. The receiver belongs to the `PaymentSync`.
pub fn charge_created_channel() -> (ChargeCreatedSender, ChargeCreatedReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Senders handed to the HTTP handlers.
#[derive(Clone)]
pub struct EventSenders {
    pub order_event: OrderEventSender,
    pub charge_created: ChargeCreatedSender,
}

impl EventSenders {
    pub fn new(order_event: OrderEventSender, charge_created: ChargeCreatedSender) -> Self {
        Self {
            order_event,
            charge_created,
        }
    }

    /// Emit an order event without blocking the request. A full or closed
    /// channel only loses the notification.
    pub fn emit_order_event(&self, event: OrderEvent) {
        if let Err(e) = self.order_event.try_send(event) {
            tracing::warn!(order_id = %event.order_id(), error = %e, "Dropping order event");
        }
    }

    pub fn emit_charge_created(&self, event: ChargeCreated) {
        if let Err(e) = self.charge_created.try_send(event) {
            tracing::warn!(order_id = %event.order_id, error = %e, "Dropping charge event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_emit_delivers_events() {
        let (order_tx, mut order_rx) = order_event_channel();
        let (charge_tx, mut charge_rx) = charge_created_channel();
        let senders = EventSenders::new(order_tx, charge_tx);
        let order_id = Uuid::now_v7();

        senders.emit_order_event(OrderEvent::Created { order_id });
        senders.emit_charge_created(ChargeCreated { order_id });

        assert_eq!(order_rx.recv().await, Some(OrderEvent::Created { order_id }));
        assert_eq!(charge_rx.recv().await, Some(ChargeCreated { order_id }));
    }

    #[tokio::test]
    async fn test_emit_to_closed_channel_does_not_panic() {
        let (order_tx, order_rx) = order_event_channel();
        let (charge_tx, _charge_rx) = charge_created_channel();
        drop(order_rx);
        let senders = EventSenders::new(order_tx, charge_tx);
        senders.emit_order_event(OrderEvent::PaymentApproved {
            order_id: Uuid::nil(),
        });
    }
}
