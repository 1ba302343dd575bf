//! The consumer loop: decode, handle, then ack or nack.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{Delivery, InMemoryBroker, Message, NackOutcome};

/// Delivery details handed to a handler alongside the message.
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    pub message_id: Uuid,
    pub delivery_count: u32,
    pub published_at: DateTime<Utc>,
}

impl DeliveryContext {
    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}

/// A consumer of one message type.
///
/// Returning `Err` asks the channel to deliver the message again, so a
/// handler must only fail for conditions that a retry can fix, and must be
/// safe to run more than once for the same message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    type Message: Message;
    type Error: std::fmt::Display + Send;

    async fn handle(
        &self,
        message: Self::Message,
        context: &DeliveryContext,
    ) -> Result<(), Self::Error>;
}

/// What the dispatcher did with one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Acked,
    Requeued,
    DeadLettered,
}

/// Runs one delivery through a handler and settles it with the broker.
pub async fn dispatch<H: MessageHandler>(
    broker: &InMemoryBroker,
    handler: &H,
    delivery: Delivery,
) -> DispatchOutcome {
    let Delivery { tag, envelope } = delivery;

    let message = match envelope.decode::<H::Message>() {
        Ok(message) => message,
        Err(e) => {
            tracing::error!(
                message_id = %envelope.message_id,
                topic = %envelope.topic,
                error = %e,
                "Undecodable message"
            );
            broker.dead_letter(tag, &e.to_string());
            return DispatchOutcome::DeadLettered;
        }
    };

    let context = DeliveryContext {
        message_id: envelope.message_id,
        delivery_count: envelope.delivery_count,
        published_at: envelope.published_at,
    };

    match handler.handle(message, &context).await {
        Ok(()) => {
            broker.ack(tag);
            DispatchOutcome::Acked
        }
        Err(e) => {
            tracing::warn!(
                message_id = %context.message_id,
                topic = %envelope.topic,
                delivery = context.delivery_count,
                error = %e,
                "Handler failed, message will be redelivered"
            );
            match broker.nack(tag, &e.to_string()) {
                NackOutcome::DeadLettered => DispatchOutcome::DeadLettered,
                NackOutcome::Requeued { .. } | NackOutcome::Unknown => DispatchOutcome::Requeued,
            }
        }
    }
}

/// Consumes `H::Message` until `shutdown` flips to true.
pub async fn run_consumer<H: MessageHandler>(
    broker: InMemoryBroker,
    handler: Arc<H>,
    mut shutdown: watch::Receiver<bool>,
) {
    let topic = <H::Message as Message>::TOPIC;
    tracing::info!(topic, "Consumer started");

    while let Some(delivery) = broker.receive(topic, &mut shutdown).await {
        dispatch(&broker, handler.as_ref(), delivery).await;
    }

    tracing::info!(topic, "Consumer stopped");
}

/// Dispatches every message currently ready on the handler's topic,
/// including requeued ones. Returns how many deliveries were made.
pub async fn drain<H: MessageHandler>(broker: &InMemoryBroker, handler: &H) -> usize {
    let topic = <H::Message as Message>::TOPIC;
    let mut delivered = 0;
    while let Some(delivery) = broker.try_receive(topic) {
        dispatch(broker, handler, delivery).await;
        delivered += 1;
    }
    delivered
}
