//! In-process cache backend.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use orderline_core::cache::Cache;
use orderline_core::error::PipelineError;
use orderline_core::health::HealthCheck;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// A TTL cache held in process memory.
///
/// Expired entries are treated as misses and evicted on read. Keys that are
/// never read again are reclaimed by [`MemoryCache::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, live or not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        u64::try_from(before - entries.len()).unwrap_or(u64::MAX)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, PipelineError> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PipelineError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| PipelineError::Transport(format!("ttl {ttl:?} out of range")))?;
        self.entries.write().insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PipelineError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for MemoryCache {
    async fn check(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}
