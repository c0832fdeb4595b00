//! Notification dispatch for new orders.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orderline_core::clock::Clock;
use orderline_core::error::PipelineError;
use orderline_core::event::OrderCreatedEvent;
use orderline_core::handler::EventHandler;
use orderline_core::notification::{Notification, NotificationSink};

/// Simulated latency of the external notification provider.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(500);

/// Sends an order-confirmation notification per event.
#[derive(Clone)]
pub struct NotificationService {
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    delay: Duration,
}

impl NotificationService {
    /// Creates a service that waits `delay` before every send.
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>, clock: Arc<dyn Clock>, delay: Duration) -> Self {
        Self { sink, clock, delay }
    }

    /// Sends the notification for one new order.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Handler` if the sink rejects the notification.
    pub async fn send_notification(&self, event: &OrderCreatedEvent) -> Result<(), PipelineError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let notification = Notification::order_created(event, self.clock.now());
        self.sink
            .send(&notification)
            .await
            .map_err(|e| PipelineError::Handler(format!("failed to send notification: {e}")))
    }
}

#[async_trait]
impl EventHandler for NotificationService {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn handle(&self, event: &OrderCreatedEvent) -> Result<(), PipelineError> {
        self.send_notification(event).await
    }
}
