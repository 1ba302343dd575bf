//! Transport envelope around a serialized message.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Message, MessagingError, Result};

/// A message as it travels through the broker.
///
/// `message_id` is assigned once at publish time and survives redelivery,
/// so handlers can use it as a causation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub message_id: Uuid,
    pub topic: String,
    pub key: AggregateId,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
    /// How many times this envelope has been handed to a consumer.
    pub delivery_count: u32,
}

impl MessageEnvelope {
    /// Serializes a message into a fresh envelope.
    pub fn wrap<M: Message>(message: &M) -> Result<Self> {
        Ok(Self {
            message_id: Uuid::new_v4(),
            topic: M::TOPIC.to_string(),
            key: message.key(),
            payload: serde_json::to_value(message)?,
            published_at: Utc::now(),
            delivery_count: 0,
        })
    }

    /// Decodes the payload as `M`, checking the topic first.
    pub fn decode<M: Message>(&self) -> Result<M> {
        if self.topic != M::TOPIC {
            return Err(MessagingError::TopicMismatch {
                expected: M::TOPIC.to_string(),
                actual: self.topic.clone(),
            });
        }
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Returns true when this is not the first delivery.
    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}
