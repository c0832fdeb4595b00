//! Notification worker: sends a customer notification per `OrderCreated`
//! event. Serves only health and metrics endpoints.

use std::sync::Arc;

use orderline_api::app::worker_router;
use orderline_api::bootstrap;
use orderline_api::config::WorkerConfig;
use orderline_api::error::AppError;
use orderline_api::metrics::PipelineMetrics;
use orderline_api::shutdown::spawn_signal_listener;
use orderline_api::state::{HealthProbes, WorkerAppState};
use orderline_api::telemetry;
use orderline_channel::pg_channel::PgEventChannel;
use orderline_channel::topology::{binding_for, declare_binding};
use orderline_consumer::consumer::Consumer;
use orderline_core::channel::NOTIFICATIONS_QUEUE;
use orderline_core::clock::SystemClock;
use orderline_notification::service::NotificationService;
use orderline_notification::sink::TracingNotificationSink;
use tracing::info;

const SERVICE_NAME: &str = "notification-worker";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = WorkerConfig::from_env()?;
    let _telemetry = telemetry::init(SERVICE_NAME, config.otlp_endpoint.as_deref())?;

    info!(queue = NOTIFICATIONS_QUEUE, "starting notification worker");

    let shutdown = spawn_signal_listener();
    let pool = bootstrap::connect(&config.database).await?;

    let channel = Arc::new(PgEventChannel::new(pool.clone()));
    let binding = binding_for(NOTIFICATIONS_QUEUE).ok_or_else(|| {
        AppError::Config(format!("no binding declared for {NOTIFICATIONS_QUEUE}"))
    })?;
    declare_binding(&channel, binding).await?;

    let notifications = NotificationService::new(
        Arc::new(TracingNotificationSink),
        Arc::new(SystemClock),
        config.send_delay,
    );
    let consumer = Consumer::new(
        Arc::new(channel.source(NOTIFICATIONS_QUEUE, config.consumer.lease)),
        Arc::new(notifications),
        config.consumer.policy,
        config.consumer.poll_interval,
    );
    let metrics = PipelineMetrics::new()?
        .with_channel(channel.clone(), &[NOTIFICATIONS_QUEUE])
        .with_consumer(NOTIFICATIONS_QUEUE, consumer.stats());
    let consumer_token = shutdown.clone();
    let consumer_task = tokio::spawn(async move { consumer.run(consumer_token).await });

    let state = WorkerAppState {
        health: HealthProbes::new(SERVICE_NAME).with("mq", channel),
        metrics: Arc::new(metrics),
    };

    let served =
        bootstrap::serve(config.listen.socket_addr()?, worker_router(state), shutdown.clone())
            .await;
    shutdown.cancel();

    let _ = consumer_task.await;
    pool.close().await;
    info!("notification worker stopped");

    served
}
