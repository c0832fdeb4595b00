//! Notification sinks.

use async_trait::async_trait;
use orderline_core::error::PipelineError;
use orderline_core::notification::{Notification, NotificationSink};
use tracing::info;

/// Sink that records notifications in the structured log instead of
/// contacting a mail provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn send(&self, notification: &Notification) -> Result<(), PipelineError> {
        info!(
            order_id = %notification.order_id,
            recipient = %notification.recipient,
            kind = ?notification.kind,
            subject = %notification.subject,
            "notification sent"
        );
        Ok(())
    }
}
