//! Process wiring shared by the binaries.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use orderline_core::cache::Cache;
use orderline_core::error::PipelineError;
use orderline_core::health::HealthCheck;
use orderline_store::memory_cache::MemoryCache;
use orderline_store::pg_cache::PgCache;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CacheBackend, DatabaseConfig};
use crate::error::AppError;

/// How often expired entries are purged from the cache backend.
pub const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Opens the connection pool and applies pending migrations.
///
/// # Errors
///
/// Returns `AppError::Database` if the pool cannot connect, or
/// `AppError::Migrate` if a migration fails.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("database migrations applied");

    Ok(pool)
}

/// A cache handle together with its health probe.
pub struct CacheHandles {
    /// The cache itself.
    pub cache: Arc<dyn Cache>,
    /// Probe reported as `cache` under `/health`.
    pub health: Arc<dyn HealthCheck>,
}

/// Builds the configured cache backend with a background purge of expired
/// entries that stops with `shutdown`.
#[must_use]
pub fn cache(backend: CacheBackend, pool: &PgPool, shutdown: &CancellationToken) -> CacheHandles {
    match backend {
        CacheBackend::Memory => {
            let cache = Arc::new(MemoryCache::new());
            let purged = cache.clone();
            tokio::spawn(purge_loop(shutdown.clone(), move || {
                let cache = purged.clone();
                async move { Ok(cache.purge_expired()) }
            }));
            CacheHandles {
                cache: cache.clone(),
                health: cache,
            }
        }
        CacheBackend::Postgres => {
            let cache = Arc::new(PgCache::new(pool.clone()));
            let purged = cache.clone();
            tokio::spawn(purge_loop(shutdown.clone(), move || {
                let cache = purged.clone();
                async move { cache.purge_expired().await }
            }));
            CacheHandles {
                cache: cache.clone(),
                health: cache,
            }
        }
    }
}

/// Runs `purge` every [`CACHE_PURGE_INTERVAL`] until `shutdown` is cancelled.
pub async fn purge_loop<F, Fut>(shutdown: CancellationToken, purge: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<u64, PipelineError>>,
{
    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            () = tokio::time::sleep(CACHE_PURGE_INTERVAL) => {}
        }
        match purge().await {
            Ok(purged) => debug!(purged, "purged expired cache entries"),
            Err(e) => warn!(error = %e, "failed to purge expired cache entries"),
        }
    }
}

/// Serves `router` on `addr` until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Server` if the listener cannot bind or the server fails.
pub async fn serve(
    addr: SocketAddr,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
