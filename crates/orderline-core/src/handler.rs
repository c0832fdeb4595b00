//! Consumer-side event handling.

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::event::OrderCreatedEvent;

/// Processes one decoded `OrderCreated` event on behalf of a consumer group.
///
/// An `Err` asks the consumer loop to redeliver the event; `Ok` acknowledges
/// it. Handlers must tolerate seeing the same event more than once.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Handles one event.
    async fn handle(&self, event: &OrderCreatedEvent) -> Result<(), PipelineError>;
}
