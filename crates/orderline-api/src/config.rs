//! Environment-driven configuration for the three processes.
//!
//! Every loader takes a lookup function so tests can supply variables
//! without touching the process environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use orderline_consumer::policy::{DEFAULT_MAX_ATTEMPTS, DeliveryPolicy, ParseFailureAction};
use orderline_orders::application::order_cache::ORDER_CACHE_TTL;
use orderline_orders::application::outbox_relay::DEFAULT_BATCH_SIZE;
use orderline_orders::application::publish::PublishMode;

use crate::error::AppError;

/// Connection settings for the shared Postgres instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Connection string.
    pub url: String,
    /// Pool size.
    pub max_connections: u32,
}

/// Where the HTTP listener binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl ListenConfig {
    /// Parses `host:port` into a socket address.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the combination is not a valid address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

/// Which cache implementation backs a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    /// Per-process map.
    #[default]
    Memory,
    /// Shared `cache_entries` table.
    Postgres,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" => Ok(Self::Postgres),
            other => Err(format!("unknown cache backend `{other}`")),
        }
    }
}

/// Settings shared by both consumer processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Pause between polls of an empty queue.
    pub poll_interval: Duration,
    /// How long a received message stays invisible to other receivers.
    pub lease: Duration,
    /// Retry ceiling and parse-failure handling.
    pub policy: DeliveryPolicy,
}

/// Configuration of the `order-api` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderServiceConfig {
    pub database: DatabaseConfig,
    pub listen: ListenConfig,
    pub cache_backend: CacheBackend,
    pub publish_mode: PublishMode,
    pub outbox_poll_interval: Duration,
    pub outbox_batch_size: i64,
    pub order_cache_ttl: Duration,
    pub otlp_endpoint: Option<String>,
}

/// Configuration of the `analytics-api` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsServiceConfig {
    pub database: DatabaseConfig,
    pub listen: ListenConfig,
    pub cache_backend: CacheBackend,
    pub consumer: ConsumerConfig,
    pub otlp_endpoint: Option<String>,
}

/// Configuration of the `notification-worker` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub database: DatabaseConfig,
    pub listen: ListenConfig,
    pub consumer: ConsumerConfig,
    pub send_delay: Duration,
    pub otlp_endpoint: Option<String>,
}

impl OrderServiceConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for missing or invalid variables.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(env_lookup)
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for missing or invalid variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        Ok(Self {
            database: database(&lookup)?,
            listen: listen(&lookup, 8080)?,
            cache_backend: parsed(&lookup, "CACHE_BACKEND", CacheBackend::default())?,
            publish_mode: parsed(&lookup, "PUBLISH_MODE", PublishMode::default())?,
            outbox_poll_interval: millis(&lookup, "OUTBOX_POLL_INTERVAL_MS", 1000)?,
            outbox_batch_size: parsed(&lookup, "OUTBOX_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            order_cache_ttl: Duration::from_secs(parsed(
                &lookup,
                "ORDER_CACHE_TTL_SECS",
                ORDER_CACHE_TTL.as_secs(),
            )?),
            otlp_endpoint: otlp_endpoint(&lookup),
        })
    }
}

impl AnalyticsServiceConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for missing or invalid variables.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(env_lookup)
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for missing or invalid variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        Ok(Self {
            database: database(&lookup)?,
            listen: listen(&lookup, 8081)?,
            cache_backend: parsed(&lookup, "CACHE_BACKEND", CacheBackend::default())?,
            consumer: consumer(&lookup)?,
            otlp_endpoint: otlp_endpoint(&lookup),
        })
    }
}

impl WorkerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for missing or invalid variables.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(env_lookup)
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for missing or invalid variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        Ok(Self {
            database: database(&lookup)?,
            listen: listen(&lookup, 8082)?,
            consumer: consumer(&lookup)?,
            send_delay: millis(&lookup, "NOTIFICATION_DELAY_MS", 500)?,
            otlp_endpoint: otlp_endpoint(&lookup),
        })
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn database(lookup: &impl Fn(&str) -> Option<String>) -> Result<DatabaseConfig, AppError> {
    let url = lookup("DATABASE_URL")
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".to_owned())
        })?;
    Ok(DatabaseConfig {
        url,
        max_connections: parsed(lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
    })
}

fn listen(
    lookup: &impl Fn(&str) -> Option<String>,
    default_port: u16,
) -> Result<ListenConfig, AppError> {
    Ok(ListenConfig {
        host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
        port: parsed(lookup, "PORT", default_port)?,
    })
}

fn consumer(lookup: &impl Fn(&str) -> Option<String>) -> Result<ConsumerConfig, AppError> {
    let max_attempts = parsed(lookup, "CONSUMER_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
    let on_parse_failure = parsed(
        lookup,
        "CONSUMER_PARSE_FAILURE",
        ParseFailureAction::default(),
    )?;
    Ok(ConsumerConfig {
        poll_interval: millis(lookup, "CONSUMER_POLL_INTERVAL_MS", 250)?,
        lease: Duration::from_secs(parsed(lookup, "CONSUMER_LEASE_SECS", 30)?),
        policy: DeliveryPolicy::new(max_attempts, on_parse_failure),
    })
}

fn otlp_endpoint(lookup: &impl Fn(&str) -> Option<String>) -> Option<String> {
    lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|endpoint| !endpoint.trim().is_empty())
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<Duration, AppError> {
    parsed(lookup, name, default).map(Duration::from_millis)
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{name} is invalid: {e}"))),
    }
}
