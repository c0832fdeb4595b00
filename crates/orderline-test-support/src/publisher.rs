//! Test publishers — `EventPublisher` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use orderline_core::channel::{EventPublisher, OutboundMessage};
use orderline_core::error::PipelineError;

/// A publisher that records every message and reports one routed copy.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<OutboundMessage>>,
}

impl RecordingPublisher {
    /// Creates an empty recording publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every published message.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<OutboundMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<usize, PipelineError> {
        self.published.lock().unwrap().push(message);
        Ok(1)
    }
}

/// A publisher whose channel is always down.
#[derive(Debug)]
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _message: OutboundMessage) -> Result<usize, PipelineError> {
        Err(PipelineError::Transport("channel connection refused".into()))
    }
}
