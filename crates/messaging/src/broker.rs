//! Publishing and an in-memory at-least-once broker.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};
use uuid::Uuid;

use crate::{Message, MessageEnvelope, MessagingError, Result};

/// Default number of deliveries before a message is dead-lettered.
pub const DEFAULT_MAX_DELIVERIES: u32 = 5;

/// Default number of published envelopes and dead letters kept for
/// inspection. Older entries are dropped first.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1024;

/// Anything that can put an envelope on a channel.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_envelope(&self, envelope: MessageEnvelope) -> Result<()>;
}

/// Typed publishing on top of [`Publisher`].
#[async_trait]
pub trait PublisherExt: Publisher {
    /// Wraps and publishes a message, returning its message id.
    async fn publish<M: Message>(&self, message: &M) -> Result<Uuid> {
        let envelope = MessageEnvelope::wrap(message)?;
        let message_id = envelope.message_id;
        self.publish_envelope(envelope).await?;
        Ok(message_id)
    }
}

impl<T: Publisher + ?Sized> PublisherExt for T {}

/// One hand-off of an envelope to a consumer.
///
/// The tag identifies this delivery, not the message: a redelivered or
/// duplicated message gets a new tag.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: u64,
    pub envelope: MessageEnvelope,
}

/// What happened to a negatively acknowledged delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackOutcome {
    /// Back on the queue for another delivery.
    Requeued { delivery_count: u32 },
    /// Delivery limit reached; moved to the dead-letter list.
    DeadLettered,
    /// The tag was not in flight (already acked or unknown).
    Unknown,
}

/// A message that will not be delivered again.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub envelope: MessageEnvelope,
    pub reason: String,
    pub dead_lettered_at: DateTime<Utc>,
}

#[derive(Default)]
struct TopicQueue {
    ready: VecDeque<MessageEnvelope>,
    in_flight: HashMap<u64, MessageEnvelope>,
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, TopicQueue>,
    published: VecDeque<MessageEnvelope>,
    dead_letters: VecDeque<DeadLetter>,
    dead_letter_total: u64,
    next_tag: u64,
    fail_on_publish: bool,
}

fn push_bounded<T>(log: &mut VecDeque<T>, item: T, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while log.len() >= capacity {
        log.pop_front();
    }
    log.push_back(item);
}

impl BrokerState {
    fn queue(&mut self, topic: &str) -> &mut TopicQueue {
        self.topics.entry(topic.to_string()).or_default()
    }

    fn push_dead_letter(&mut self, dead: DeadLetter, capacity: usize) {
        self.dead_letter_total += 1;
        push_bounded(&mut self.dead_letters, dead, capacity);
    }

    fn take_in_flight(&mut self, tag: u64) -> Option<MessageEnvelope> {
        self.topics
            .values_mut()
            .find_map(|queue| queue.in_flight.remove(&tag))
    }
}

/// In-process broker with at-least-once semantics.
///
/// Each topic is a FIFO queue shared by every consumer of that topic. A
/// delivered message stays in flight until it is acked; a nack puts it back
/// at the end of the queue until `max_deliveries` is reached, after which
/// it is dead-lettered.
///
/// Published envelopes and dead letters are kept in bounded logs of
/// `history_capacity` entries each.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
    max_deliveries: u32,
    history_capacity: usize,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DELIVERIES)
    }
}

impl InMemoryBroker {
    pub fn new(max_deliveries: u32) -> Self {
        Self {
            state: Arc::default(),
            notify: Arc::new(Notify::new()),
            max_deliveries: max_deliveries.max(1),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Sets how many published envelopes and dead letters are retained.
    /// Zero keeps none.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn max_deliveries(&self) -> u32 {
        self.max_deliveries
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every publish fail until switched back.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.lock().fail_on_publish = fail;
    }

    /// Takes the next ready message on a topic without waiting.
    pub fn try_receive(&self, topic: &str) -> Option<Delivery> {
        let mut state = self.lock();
        state.next_tag += 1;
        let tag = state.next_tag;

        let queue = state.queue(topic);
        let mut envelope = queue.ready.pop_front()?;
        envelope.delivery_count += 1;
        queue.in_flight.insert(tag, envelope.clone());

        if envelope.is_redelivery() {
            metrics::counter!("messages_redelivered_total", "topic" => topic.to_string())
                .increment(1);
        }

        Some(Delivery { tag, envelope })
    }

    /// Waits for the next message on a topic.
    ///
    /// Returns `None` once `shutdown` flips to true or its sender is gone.
    pub async fn receive(
        &self,
        topic: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Delivery> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if *shutdown.borrow() {
                return None;
            }
            if let Some(delivery) = self.try_receive(topic) {
                return Some(delivery);
            }

            tokio::select! {
                _ = &mut notified => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    /// Confirms a delivery. Returns false if the tag was not in flight.
    pub fn ack(&self, tag: u64) -> bool {
        self.lock().take_in_flight(tag).is_some()
    }

    /// Rejects a delivery so it is retried, or dead-lettered when the
    /// delivery limit is reached.
    pub fn nack(&self, tag: u64, reason: &str) -> NackOutcome {
        let outcome = {
            let mut state = self.lock();
            let Some(envelope) = state.take_in_flight(tag) else {
                return NackOutcome::Unknown;
            };

            if envelope.delivery_count >= self.max_deliveries {
                tracing::warn!(
                    message_id = %envelope.message_id,
                    topic = %envelope.topic,
                    deliveries = envelope.delivery_count,
                    reason,
                    "Delivery limit reached, dead-lettering message"
                );
                metrics::counter!("messages_dead_lettered_total", "topic" => envelope.topic.clone())
                    .increment(1);
                state.push_dead_letter(
                    DeadLetter {
                        envelope,
                        reason: reason.to_string(),
                        dead_lettered_at: Utc::now(),
                    },
                    self.history_capacity,
                );
                NackOutcome::DeadLettered
            } else {
                let delivery_count = envelope.delivery_count;
                let topic = envelope.topic.clone();
                state.queue(&topic).ready.push_back(envelope);
                NackOutcome::Requeued { delivery_count }
            }
        };

        if matches!(outcome, NackOutcome::Requeued { .. }) {
            self.notify.notify_waiters();
        }
        outcome
    }

    /// Moves a delivery straight to the dead-letter list.
    pub fn dead_letter(&self, tag: u64, reason: &str) -> bool {
        let mut state = self.lock();
        let Some(envelope) = state.take_in_flight(tag) else {
            return false;
        };
        metrics::counter!("messages_dead_lettered_total", "topic" => envelope.topic.clone())
            .increment(1);
        state.push_dead_letter(
            DeadLetter {
                envelope,
                reason: reason.to_string(),
                dead_lettered_at: Utc::now(),
            },
            self.history_capacity,
        );
        true
    }

    /// Enqueues another copy of a published message still in the history
    /// log, as a real channel may do after a consumer timeout.
    pub fn redeliver(&self, message_id: Uuid) -> bool {
        let found = {
            let mut state = self.lock();
            let Some(envelope) = state
                .published
                .iter()
                .find(|e| e.message_id == message_id)
                .cloned()
            else {
                return false;
            };
            let topic = envelope.topic.clone();
            state.queue(&topic).ready.push_back(envelope);
            true
        };
        self.notify.notify_waiters();
        found
    }

    /// The most recent envelopes accepted by `publish_envelope`, oldest
    /// first.
    pub fn published(&self) -> Vec<MessageEnvelope> {
        self.lock().published.iter().cloned().collect()
    }

    /// Published messages of one type, decoded.
    pub fn published_messages<M: Message>(&self) -> Vec<M> {
        self.lock()
            .published
            .iter()
            .filter(|e| e.topic == M::TOPIC)
            .filter_map(|e| e.decode().ok())
            .collect()
    }

    /// The most recent dead letters, oldest first.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().dead_letters.iter().cloned().collect()
    }

    /// Messages dead-lettered since startup, including ones no longer
    /// retained.
    pub fn dead_letter_count(&self) -> u64 {
        self.lock().dead_letter_total
    }

    /// Messages on a topic that are waiting or in flight.
    pub fn pending(&self, topic: &str) -> usize {
        self.lock()
            .topics
            .get(topic)
            .map(|q| q.ready.len() + q.in_flight.len())
            .unwrap_or(0)
    }

    /// Returns true when no topic has waiting or in-flight messages.
    pub fn is_idle(&self) -> bool {
        self.lock()
            .topics
            .values()
            .all(|q| q.ready.is_empty() && q.in_flight.is_empty())
    }
}

#[async_trait]
impl Publisher for InMemoryBroker {
    async fn publish_envelope(&self, envelope: MessageEnvelope) -> Result<()> {
        {
            let mut state = self.lock();
            if state.fail_on_publish {
                return Err(MessagingError::PublishFailed {
                    topic: envelope.topic,
                    reason: "broker unavailable".to_string(),
                });
            }

            tracing::debug!(
                message_id = %envelope.message_id,
                topic = %envelope.topic,
                key = %envelope.key,
                "Publishing message"
            );
            metrics::counter!("messages_published_total", "topic" => envelope.topic.clone())
                .increment(1);

            push_bounded(&mut state.published, envelope.clone(), self.history_capacity);
            let topic = envelope.topic.clone();
            state.queue(&topic).ready.push_back(envelope);
        }
        self.notify.notify_waiters();
        Ok(())
    }
}
