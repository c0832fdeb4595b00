//! Declaration of the exchanges, queues, and bindings the pipeline relies on.

use orderline_core::channel::{
    ANALYTICS_QUEUE, NOTIFICATIONS_QUEUE, ORDER_CREATED_ROUTING_KEY, ORDERS_EXCHANGE,
};
use orderline_core::error::PipelineError;

use crate::pg_channel::PgEventChannel;

/// A queue and the routing pattern it is bound with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueBinding {
    /// Durable queue name.
    pub queue: &'static str,
    /// Exchange the queue is bound to.
    pub exchange: &'static str,
    /// Binding key, may contain `*` and `#`.
    pub binding_key: &'static str,
}

/// Every consumer queue of the order pipeline.
pub const ORDER_BINDINGS: [QueueBinding; 2] = [
    QueueBinding {
        queue: ANALYTICS_QUEUE,
        exchange: ORDERS_EXCHANGE,
        binding_key: ORDER_CREATED_ROUTING_KEY,
    },
    QueueBinding {
        queue: NOTIFICATIONS_QUEUE,
        exchange: ORDERS_EXCHANGE,
        binding_key: ORDER_CREATED_ROUTING_KEY,
    },
];

/// The binding of a consumer queue, if it is one of the pipeline's.
#[must_use]
pub fn binding_for(queue: &str) -> Option<QueueBinding> {
    ORDER_BINDINGS.into_iter().find(|b| b.queue == queue)
}

/// Declares a queue, its exchange, and the binding between them.
///
/// Each consumer calls this for its own queue on startup, so its queue
/// collects events even while the consumer is down.
///
/// # Errors
///
/// Returns `PipelineError::Transport` if any declaration fails.
pub async fn declare_binding(
    channel: &PgEventChannel,
    binding: QueueBinding,
) -> Result<(), PipelineError> {
    channel.declare_exchange(binding.exchange).await?;
    channel.declare_queue(binding.queue).await?;
    channel
        .bind_queue(binding.queue, binding.exchange, binding.binding_key)
        .await
}

/// Declares the orders exchange and every consumer queue bound to it.
///
/// Declarations are idempotent.
///
/// # Errors
///
/// Returns `PipelineError::Transport` if any declaration fails.
pub async fn declare_order_topology(channel: &PgEventChannel) -> Result<(), PipelineError> {
    channel.declare_exchange(ORDERS_EXCHANGE).await?;
    for binding in ORDER_BINDINGS {
        declare_binding(channel, binding).await?;
    }
    Ok(())
}
