use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Domain events emitted by the reconciliation pipeline. Consumed by a
/// background task for operational visibility; delivery of an event is
/// best-effort and never blocks the webhook response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        reference: String,
    },
    PaymentStatusChanged {
        order_id: Uuid,
        reference: String,
        old_status: String,
        new_status: String,
    },
    VoucherIssued {
        order_id: Uuid,
        voucher_id: Uuid,
        code: String,
    },
    VoucherIssuanceFailed {
        order_id: Uuid,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously; a full or closed channel is logged
    /// and otherwise ignored.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("Failed to publish event: {}", e);
        }
    }
}

/// Background consumer: logs pipeline outcomes until the channel closes.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                reference,
            } => {
                info!(%order_id, %reference, "order created");
            }
            Event::PaymentStatusChanged {
                order_id,
                reference,
                old_status,
                new_status,
            } => {
                info!(
                    %order_id,
                    %reference,
                    %old_status,
                    %new_status,
                    "payment status changed"
                );
            }
            Event::VoucherIssued {
                order_id,
                voucher_id,
                code,
            } => {
                info!(%order_id, %voucher_id, %code, "voucher issued");
            }
            Event::VoucherIssuanceFailed { order_id, reason } => {
                error!(%order_id, %reason, "voucher issuance failed");
            }
        }
    }
    info!("Event channel closed; event processor exiting");
}
