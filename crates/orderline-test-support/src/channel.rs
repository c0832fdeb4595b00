//! In-memory event channel with the same routing and acknowledgement rules
//! as the durable one.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use orderline_channel::topic::topic_matches;
use orderline_channel::topology::ORDER_BINDINGS;
use orderline_core::channel::{Delivery, EventPublisher, MessageSource, NackAction, OutboundMessage};
use orderline_core::error::PipelineError;

#[derive(Debug)]
struct QueuedMessage {
    delivery: Delivery,
    leased: bool,
}

#[derive(Debug, Default)]
struct ChannelState {
    next_tag: i64,
    exchanges: BTreeSet<String>,
    bindings: Vec<(String, String, String)>,
    queues: BTreeMap<String, Vec<QueuedMessage>>,
    dead_letters: BTreeMap<String, Vec<(Delivery, String)>>,
}

/// A topic exchange held in process memory.
///
/// Clones share state, so a test can publish through one handle and consume
/// through another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl InMemoryEventChannel {
    /// Creates a channel with nothing declared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a channel with the order exchange and both consumer queues
    /// declared and bound.
    #[must_use]
    pub fn with_order_topology() -> Self {
        let channel = Self::new();
        for binding in ORDER_BINDINGS {
            channel.declare_exchange(binding.exchange);
            channel.declare_queue(binding.queue);
            channel.bind_queue(binding.queue, binding.exchange, binding.binding_key);
        }
        channel
    }

    /// Declares an exchange.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn declare_exchange(&self, name: &str) {
        self.state.lock().unwrap().exchanges.insert(name.to_owned());
    }

    /// Declares a queue.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn declare_queue(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .queues
            .entry(name.to_owned())
            .or_default();
    }

    /// Binds a declared queue to an exchange.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn bind_queue(&self, queue: &str, exchange: &str, binding_key: &str) {
        self.state.lock().unwrap().bindings.push((
            queue.to_owned(),
            exchange.to_owned(),
            binding_key.to_owned(),
        ));
    }

    /// Opens a consumer handle on `queue`.
    #[must_use]
    pub fn source(&self, queue: &str) -> InMemoryQueueSource {
        InMemoryQueueSource {
            state: Arc::clone(&self.state),
            queue: queue.to_owned(),
        }
    }

    /// Messages waiting in, or leased from, `queue`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map_or(0, Vec::len)
    }

    /// Dead-lettered deliveries of `queue` with their reasons.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn dead_letters(&self, queue: &str) -> Vec<(Delivery, String)> {
        self.state
            .lock()
            .unwrap()
            .dead_letters
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes every leased message of `queue` visible again, as if the
    /// consumer holding the leases had died.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn expire_leases(&self, queue: &str) {
        if let Some(messages) = self.state.lock().unwrap().queues.get_mut(queue) {
            for message in messages {
                message.leased = false;
            }
        }
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventChannel {
    async fn publish(&self, message: OutboundMessage) -> Result<usize, PipelineError> {
        let mut state = self.state.lock().unwrap();
        if !state.exchanges.contains(&message.exchange) {
            return Err(PipelineError::Transport(format!(
                "exchange `{}` is not declared",
                message.exchange
            )));
        }
        let targets: BTreeSet<String> = state
            .bindings
            .iter()
            .filter(|(_, exchange, key)| {
                *exchange == message.exchange && topic_matches(key, &message.routing_key)
            })
            .map(|(queue, _, _)| queue.clone())
            .collect();
        for queue in &targets {
            state.next_tag += 1;
            let delivery = Delivery {
                delivery_tag: state.next_tag,
                queue: queue.clone(),
                routing_key: message.routing_key.clone(),
                event_type: message.event_type.clone(),
                body: message.body.clone(),
                delivery_count: 0,
            };
            state
                .queues
                .entry(queue.clone())
                .or_default()
                .push(QueuedMessage {
                    delivery,
                    leased: false,
                });
        }
        Ok(targets.len())
    }
}

/// Consumer handle on one queue of an [`InMemoryEventChannel`].
#[derive(Debug, Clone)]
pub struct InMemoryQueueSource {
    state: Arc<Mutex<ChannelState>>,
    queue: String,
}

impl InMemoryQueueSource {
    fn unknown_tag(&self, delivery: &Delivery) -> PipelineError {
        PipelineError::Transport(format!(
            "unknown delivery tag {} on queue `{}`",
            delivery.delivery_tag, self.queue
        ))
    }

    fn take(&self, delivery: &Delivery) -> Result<QueuedMessage, PipelineError> {
        let mut state = self.state.lock().unwrap();
        let messages = state
            .queues
            .get_mut(&self.queue)
            .ok_or_else(|| self.unknown_tag(delivery))?;
        let index = messages
            .iter()
            .position(|m| m.delivery.delivery_tag == delivery.delivery_tag)
            .ok_or_else(|| self.unknown_tag(delivery))?;
        Ok(messages.remove(index))
    }
}

#[async_trait]
impl MessageSource for InMemoryQueueSource {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn receive(&self) -> Result<Option<Delivery>, PipelineError> {
        let mut state = self.state.lock().unwrap();
        let next = state
            .queues
            .get_mut(&self.queue)
            .and_then(|messages| messages.iter_mut().find(|m| !m.leased));
        Ok(next.map(|message| {
            message.leased = true;
            message.delivery.delivery_count += 1;
            message.delivery.clone()
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), PipelineError> {
        self.take(delivery).map(|_| ())
    }

    async fn nack(&self, delivery: &Delivery, action: NackAction) -> Result<(), PipelineError> {
        match action {
            NackAction::Drop => self.take(delivery).map(|_| ()),
            NackAction::Requeue => {
                let mut state = self.state.lock().unwrap();
                let message = state
                    .queues
                    .get_mut(&self.queue)
                    .and_then(|messages| {
                        messages
                            .iter_mut()
                            .find(|m| m.delivery.delivery_tag == delivery.delivery_tag)
                    })
                    .ok_or_else(|| self.unknown_tag(delivery))?;
                message.leased = false;
                Ok(())
            }
        }
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), PipelineError> {
        let message = self.take(delivery)?;
        self.state
            .lock()
            .unwrap()
            .dead_letters
            .entry(self.queue.clone())
            .or_default()
            .push((message.delivery, reason.to_owned()));
        Ok(())
    }
}
