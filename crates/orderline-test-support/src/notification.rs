//! Test notification sink.

use std::sync::Mutex;

use async_trait::async_trait;
use orderline_core::error::PipelineError;
use orderline_core::notification::{Notification, NotificationSink};

/// A sink that records every notification. Can be told to fail a number of
/// sends first.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    sent: Mutex<Vec<Notification>>,
    failures_left: Mutex<usize>,
}

impl RecordingNotificationSink {
    /// Creates a sink that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink whose first `failures` sends fail.
    #[must_use]
    pub fn failing_first(failures: usize) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures_left: Mutex::new(failures),
        }
    }

    /// Returns a snapshot of every notification sent successfully.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn send(&self, notification: &Notification) -> Result<(), PipelineError> {
        {
            let mut failures_left = self.failures_left.lock().unwrap();
            if *failures_left > 0 {
                *failures_left -= 1;
                return Err(PipelineError::Transport("mail relay unavailable".into()));
            }
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
