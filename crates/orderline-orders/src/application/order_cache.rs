//! Cache-aside copy of orders.
//!
//! Every operation is best effort: backend failures and undecodable entries
//! are logged and behave like a miss, so the caller always falls back to the
//! order store.

use std::sync::Arc;
use std::time::Duration;

use orderline_core::cache::Cache;
use orderline_core::order::Order;
use tracing::warn;
use uuid::Uuid;

/// How long a cached order stays valid.
pub const ORDER_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Cache key of an order.
#[must_use]
pub fn order_cache_key(id: Uuid) -> String {
    format!("order:{id}")
}

/// Typed view over a [`Cache`] backend holding JSON-encoded orders.
#[derive(Clone)]
pub struct OrderCache {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl OrderCache {
    /// Wraps a backend with the default TTL.
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            ttl: ORDER_CACHE_TTL,
        }
    }

    /// Overrides the entry TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the cached order, or `None` on a miss or any cache failure.
    pub async fn get(&self, id: Uuid) -> Option<Order> {
        let key = order_cache_key(id);
        let raw = match self.cache.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(order_id = %id, error = %e, "order cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(order) => Some(order),
            Err(e) => {
                warn!(order_id = %id, error = %e, "discarding undecodable cached order");
                self.invalidate(id).await;
                None
            }
        }
    }

    /// Stores a copy of `order`. Failures are logged, never returned.
    pub async fn put(&self, order: &Order) {
        let value = match serde_json::to_string(order) {
            Ok(value) => value,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "order cache encode failed");
                return;
            }
        };
        if let Err(e) = self
            .cache
            .set(&order_cache_key(order.id), &value, self.ttl)
            .await
        {
            warn!(order_id = %order.id, error = %e, "order cache write failed");
        }
    }

    /// Drops the cached copy of an order.
    pub async fn invalidate(&self, id: Uuid) {
        if let Err(e) = self.cache.delete(&order_cache_key(id)).await {
            warn!(order_id = %id, error = %e, "order cache delete failed");
        }
    }
}
