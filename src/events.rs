use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the storefront services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BagUpdated {
        session_id: String,
        product_count: u32,
    },
    CheckoutStarted {
        session_id: String,
        payment_intent_id: String,
    },
    OrderCreated(Uuid),
    CheckoutCompleted {
        order_id: Uuid,
        order_number: String,
    },
    WebhookOrderCreated {
        order_id: Uuid,
        stripe_pid: String,
    },
    PaymentFailed {
        stripe_pid: String,
    },
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn with_message(message: impl Into<String>) -> Self {
        Event::Generic {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Cloneable handle for emitting events onto the processing channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is down.
    /// Event emission is never allowed to fail a request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("event channel unavailable: {}", e);
        }
    }
}

/// Drains the event channel, recording each event in the structured log.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(%order_id, "order created");
            }
            Event::CheckoutCompleted {
                order_id,
                order_number,
            } => {
                info!(%order_id, %order_number, "checkout completed");
            }
            Event::WebhookOrderCreated {
                order_id,
                stripe_pid,
            } => {
                info!(%order_id, %stripe_pid, "order created by webhook reconciler");
            }
            Event::PaymentFailed { stripe_pid } => {
                warn!(%stripe_pid, "payment failed");
            }
            other => {
                info!(event = ?other, "event received");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_the_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender.send(Event::OrderCreated(Uuid::new_v4())).await.unwrap();

        match rx.recv().await {
            Some(Event::OrderCreated(_)) => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_or_log_swallows_a_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        sender.send_or_log(Event::with_message("late event")).await;
    }
}
