//! Test caches.

use std::time::Duration;

use async_trait::async_trait;
use orderline_core::cache::Cache;
use orderline_core::error::PipelineError;

/// A cache whose backend is always down. Useful for checking that cache
/// failures degrade to the store instead of failing requests.
#[derive(Debug)]
pub struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, PipelineError> {
        Err(PipelineError::Transport("cache connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), PipelineError> {
        Err(PipelineError::Transport("cache connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), PipelineError> {
        Err(PipelineError::Transport("cache connection refused".into()))
    }
}
