//! Cache backend on an UNLOGGED `PostgreSQL` table.
//!
//! Survives process restarts and is shared between replicas of a service,
//! at the price of a round trip per lookup. Expired rows are invisible to
//! `get` and are reclaimed by [`PgCache::purge_expired`].

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use orderline_core::cache::Cache;
use orderline_core::error::PipelineError;
use orderline_core::health::HealthCheck;

use crate::sql_error::transport;

/// PostgreSQL-backed TTL cache.
#[derive(Debug, Clone)]
pub struct PgCache {
    pool: PgPool,
}

impl PgCache {
    /// Creates a new `PgCache`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes every expired entry and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Transport` if the delete fails.
    pub async fn purge_expired(&self) -> Result<u64, PipelineError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| transport("failed to purge cache", &e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Cache for PgCache {
    async fn get(&self, key: &str) -> Result<Option<String>, PipelineError> {
        sqlx::query_scalar("SELECT value FROM cache_entries WHERE key = $1 AND expires_at > NOW()")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| transport("failed to read cache", &e))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PipelineError> {
        sqlx::query(
            "INSERT INTO cache_entries (key, value, expires_at) \
             VALUES ($1, $2, NOW() + make_interval(secs => $3)) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(|e| transport("failed to write cache", &e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PipelineError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| transport("failed to delete cache entry", &e))?;
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for PgCache {
    async fn check(&self) -> Result<(), PipelineError> {
        sqlx::query("SELECT 1 FROM cache_entries LIMIT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| transport("cache unreachable", &e))
    }
}
