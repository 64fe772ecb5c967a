use smm_sdk::objects::NotificationKind;
use uuid::Uuid;

/// Lifecycle events the customer is notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    /// Order stored in `pending_payment`.
    Created { order_id: Uuid },
    /// Gateway confirmed payment and the order moved to `processing`.
    PaymentApproved { order_id: Uuid },
}

impl OrderEvent {
    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::Created { order_id } | OrderEvent::PaymentApproved { order_id } => {
                *order_id
            }
        }
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            OrderEvent::Created { .. } => NotificationKind::OrderCreated,
            OrderEvent::PaymentApproved { .. } => NotificationKind::PaymentApproved,
        }
    }
}

/// A gateway charge was attached to an order. Wakes the payment sync so
/// fresh charges are checked on the short interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeCreated {
    pub order_id: Uuid,
}
