//! Order service: accepts orders over HTTP and announces them on the
//! `orders` exchange.

use std::sync::Arc;

use orderline_api::app::order_router;
use orderline_api::bootstrap;
use orderline_api::config::OrderServiceConfig;
use orderline_api::error::AppError;
use orderline_api::metrics::PipelineMetrics;
use orderline_api::shutdown::spawn_signal_listener;
use orderline_api::state::{HealthProbes, OrderAppState};
use orderline_api::telemetry;
use orderline_channel::pg_channel::PgEventChannel;
use orderline_core::channel::{ANALYTICS_QUEUE, NOTIFICATIONS_QUEUE, ORDERS_EXCHANGE};
use orderline_core::clock::SystemClock;
use orderline_orders::application::outbox_relay::OutboxRelay;
use orderline_orders::application::pipeline::OrderPipeline;
use orderline_orders::application::publish::PublishMode;
use orderline_store::pg_health::PgHealthCheck;
use orderline_store::pg_order_repository::PgOrderRepository;
use tracing::info;

const SERVICE_NAME: &str = "order-service";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = OrderServiceConfig::from_env()?;
    let _telemetry = telemetry::init(SERVICE_NAME, config.otlp_endpoint.as_deref())?;

    info!(
        publish_mode = %config.publish_mode,
        cache_backend = ?config.cache_backend,
        "starting order service"
    );

    let shutdown = spawn_signal_listener();
    let pool = bootstrap::connect(&config.database).await?;

    let channel = Arc::new(PgEventChannel::new(pool.clone()));
    channel.declare_exchange(ORDERS_EXCHANGE).await?;

    let caches = bootstrap::cache(config.cache_backend, &pool, &shutdown);
    let orders = Arc::new(PgOrderRepository::new(pool.clone()));
    let clock = Arc::new(SystemClock);

    let pipeline = OrderPipeline::new(
        orders.clone(),
        caches.cache,
        channel.clone(),
        clock.clone(),
        config.publish_mode,
    )
    .with_cache_ttl(config.order_cache_ttl);

    let relay = (config.publish_mode == PublishMode::Outbox).then(|| {
        let relay = OutboxRelay::new(orders, channel.clone(), clock, config.outbox_poll_interval)
            .with_batch_size(config.outbox_batch_size);
        let token = shutdown.clone();
        tokio::spawn(async move { relay.run(token).await })
    });

    let metrics = PipelineMetrics::new()?
        .with_channel(channel.clone(), &[ANALYTICS_QUEUE, NOTIFICATIONS_QUEUE]);

    let state = OrderAppState {
        pipeline,
        health: HealthProbes::new(SERVICE_NAME)
            .with("database", Arc::new(PgHealthCheck::new(pool.clone())))
            .with("cache", caches.health)
            .with("mq", channel),
        metrics: Arc::new(metrics),
    };

    let served =
        bootstrap::serve(config.listen.socket_addr()?, order_router(state), shutdown.clone())
            .await;
    shutdown.cancel();

    if let Some(relay) = relay {
        let _ = relay.await;
    }
    pool.close().await;
    info!("order service stopped");

    served
}
