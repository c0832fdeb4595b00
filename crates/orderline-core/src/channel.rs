//! Event channel abstractions: a durable topic exchange with per-consumer
//! queues and explicit acknowledgement.

use async_trait::async_trait;

use crate::error::PipelineError;

/// Exchange every order lifecycle event is published to.
pub const ORDERS_EXCHANGE: &str = "orders";

/// Routing key for [`crate::event::OrderCreatedEvent`].
pub const ORDER_CREATED_ROUTING_KEY: &str = "order.created";

/// Durable queue owned by the aggregate consumer.
pub const ANALYTICS_QUEUE: &str = "analytics.orders";

/// Durable queue owned by the notification consumer.
pub const NOTIFICATIONS_QUEUE: &str = "notifications.orders";

/// Content type of every JSON message body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A message on its way into an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Target exchange.
    pub exchange: String,
    /// Routing key matched against queue bindings.
    pub routing_key: String,
    /// Event discriminator.
    pub event_type: String,
    /// MIME type of `body`.
    pub content_type: String,
    /// Serialized payload.
    pub body: Vec<u8>,
    /// Whether the message must survive a broker restart.
    pub persistent: bool,
}

impl OutboundMessage {
    /// A persistent JSON message.
    #[must_use]
    pub fn persistent_json(
        exchange: &str,
        routing_key: &str,
        event_type: &str,
        body: Vec<u8>,
    ) -> Self {
        Self {
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            event_type: event_type.to_owned(),
            content_type: JSON_CONTENT_TYPE.to_owned(),
            body,
            persistent: true,
        }
    }
}

/// Producer-side handle on the channel.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Routes a message to every queue bound to its exchange and routing key.
    /// Returns the number of queues that received a copy.
    async fn publish(&self, message: OutboundMessage) -> Result<usize, PipelineError>;
}

/// A message leased from a queue, awaiting acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel-assigned tag used to ack or nack this delivery.
    pub delivery_tag: i64,
    /// Queue the message was leased from.
    pub queue: String,
    /// Routing key the message was published with.
    pub routing_key: String,
    /// Event discriminator.
    pub event_type: String,
    /// Serialized payload.
    pub body: Vec<u8>,
    /// How many times this message has been handed out, including this one.
    pub delivery_count: u32,
}

impl Delivery {
    /// Whether the message was delivered at least once before.
    #[must_use]
    pub fn redelivered(&self) -> bool {
        self.delivery_count > 1
    }
}

/// How a negatively acknowledged message is disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackAction {
    /// Return the message to its queue for redelivery.
    Requeue,
    /// Remove the message permanently.
    Drop,
}

/// Consumer-side handle on a single queue.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// The queue this source reads from.
    fn queue(&self) -> &str;

    /// Leases the next available message, or `Ok(None)` when the queue is empty.
    async fn receive(&self) -> Result<Option<Delivery>, PipelineError>;

    /// Removes a successfully handled message from the queue.
    async fn ack(&self, delivery: &Delivery) -> Result<(), PipelineError>;

    /// Rejects a message, either returning it to the queue or dropping it.
    async fn nack(&self, delivery: &Delivery, action: NackAction) -> Result<(), PipelineError>;

    /// Moves a message out of the queue into dead-letter storage.
    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), PipelineError>;
}
