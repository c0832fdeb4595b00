//! Key-value cache abstraction.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::PipelineError;

/// A TTL-bounded key-value cache. Entries are disposable copies.
///
/// A miss is `Ok(None)`; `Err` always means the backend itself failed
/// and is reported as `PipelineError::Transport`.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Reads a live entry.
    async fn get(&self, key: &str) -> Result<Option<String>, PipelineError>;

    /// Writes an entry that expires after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PipelineError>;

    /// Removes an entry. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), PipelineError>;
}
