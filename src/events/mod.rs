use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::order::{OrderStatus, PaymentMethod};

/// Buffer size of the in-process event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Order lifecycle events emitted by the services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        payment_method: PaymentMethod,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    CheckoutStaged {
        razorpay_order_id: String,
        user_id: Uuid,
    },
    PaymentVerified {
        order_id: Uuid,
        razorpay_order_id: String,
        razorpay_payment_id: String,
    },
    TempOrdersPurged {
        count: u64,
    },
}

#[derive(Clone, Debug)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; a closed channel is logged, never surfaced to the caller.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Creates a bounded channel and the sender half wrapped for services
pub fn channel() -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (EventSender::new(tx), rx)
}

/// Drains the channel until every sender is dropped. Returns how many events were seen.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) -> u64 {
    info!("Starting event processing loop");
    let mut processed = 0;

    while let Some(event) = rx.recv().await {
        processed += 1;
        match &event {
            Event::OrderCreated {
                order_id,
                payment_method,
            } => info!(%order_id, %payment_method, "order created"),
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => info!(%order_id, %old_status, %new_status, "order status changed"),
            Event::CheckoutStaged {
                razorpay_order_id,
                user_id,
            } => info!(%razorpay_order_id, %user_id, "checkout staged"),
            Event::PaymentVerified {
                order_id,
                razorpay_order_id,
                razorpay_payment_id,
            } => info!(
                %order_id,
                %razorpay_order_id,
                %razorpay_payment_id,
                "payment verified"
            ),
            Event::TempOrdersPurged { count } => info!(count, "expired checkouts purged"),
        }
    }

    info!(processed, "Event processing loop stopped");
    processed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn processor_drains_until_senders_drop() {
        let (sender, rx) = channel();
        let worker = tokio::spawn(process_events(rx));

        sender
            .send(Event::OrderCreated {
                order_id: Uuid::new_v4(),
                payment_method: PaymentMethod::Cod,
            })
            .await
            .unwrap();
        sender.send_or_log(Event::TempOrdersPurged { count: 2 }).await;
        drop(sender);

        assert_eq!(worker.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn send_reports_closed_channel() {
        let (sender, rx) = channel();
        drop(rx);
        assert!(sender
            .send(Event::TempOrdersPurged { count: 0 })
            .await
            .is_err());
        // does not panic
        sender.send_or_log(Event::TempOrdersPurged { count: 0 }).await;
    }
}
