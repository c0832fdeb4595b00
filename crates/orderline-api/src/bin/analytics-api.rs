//! Analytics service: consumes `OrderCreated` events into metric rows and
//! serves the summary over HTTP.

use std::sync::Arc;

use orderline_analytics::service::AnalyticsService;
use orderline_api::app::analytics_router;
use orderline_api::bootstrap;
use orderline_api::config::AnalyticsServiceConfig;
use orderline_api::error::AppError;
use orderline_api::metrics::PipelineMetrics;
use orderline_api::shutdown::spawn_signal_listener;
use orderline_api::state::{AnalyticsAppState, HealthProbes};
use orderline_api::telemetry;
use orderline_channel::pg_channel::PgEventChannel;
use orderline_channel::topology::{binding_for, declare_binding};
use orderline_consumer::consumer::Consumer;
use orderline_core::channel::ANALYTICS_QUEUE;
use orderline_core::clock::SystemClock;
use orderline_store::pg_health::PgHealthCheck;
use orderline_store::pg_metric_repository::PgMetricRepository;
use tracing::info;

const SERVICE_NAME: &str = "analytics-service";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AnalyticsServiceConfig::from_env()?;
    let _telemetry = telemetry::init(SERVICE_NAME, config.otlp_endpoint.as_deref())?;

    info!(queue = ANALYTICS_QUEUE, "starting analytics service");

    let shutdown = spawn_signal_listener();
    let pool = bootstrap::connect(&config.database).await?;

    let channel = Arc::new(PgEventChannel::new(pool.clone()));
    let binding = binding_for(ANALYTICS_QUEUE)
        .ok_or_else(|| AppError::Config(format!("no binding declared for {ANALYTICS_QUEUE}")))?;
    declare_binding(&channel, binding).await?;

    let caches = bootstrap::cache(config.cache_backend, &pool, &shutdown);
    let analytics = AnalyticsService::new(
        Arc::new(PgMetricRepository::new(pool.clone())),
        caches.cache,
        Arc::new(SystemClock),
    );

    let consumer = Consumer::new(
        Arc::new(channel.source(ANALYTICS_QUEUE, config.consumer.lease)),
        Arc::new(analytics.clone()),
        config.consumer.policy,
        config.consumer.poll_interval,
    );
    let metrics = PipelineMetrics::new()?
        .with_channel(channel.clone(), &[ANALYTICS_QUEUE])
        .with_consumer(ANALYTICS_QUEUE, consumer.stats());
    let consumer_token = shutdown.clone();
    let consumer_task = tokio::spawn(async move { consumer.run(consumer_token).await });

    let state = AnalyticsAppState {
        analytics,
        health: HealthProbes::new(SERVICE_NAME)
            .with("database", Arc::new(PgHealthCheck::new(pool.clone())))
            .with("cache", caches.health)
            .with("mq", channel),
        metrics: Arc::new(metrics),
    };

    let served =
        bootstrap::serve(config.listen.socket_addr()?, analytics_router(state), shutdown.clone())
            .await;
    shutdown.cancel();

    let _ = consumer_task.await;
    pool.close().await;
    info!("analytics service stopped");

    served
}
