//! `/metrics` scrapes against consumer counters and the Postgres channel.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use orderline_api::metrics::PipelineMetrics;
use orderline_api::state::HealthProbes;
use orderline_channel::pg_channel::PgEventChannel;
use orderline_channel::topology::declare_order_topology;
use orderline_consumer::consumer::{Consumer, Outcome};
use orderline_consumer::policy::DeliveryPolicy;
use orderline_core::channel::{
    ANALYTICS_QUEUE, EventPublisher, NOTIFICATIONS_QUEUE, ORDER_CREATED_ROUTING_KEY,
    ORDERS_EXCHANGE, OutboundMessage,
};
use orderline_core::event::{ORDER_CREATED_EVENT_TYPE, OrderCreatedEvent};
use orderline_core::order::{NewOrder, Order};
use orderline_notification::service::NotificationService;
use orderline_orders::application::publish::PublishMode;
use orderline_test_support::{
    InMemoryEventChannel, RecordingNotificationSink, RecordingPublisher, StaticHealthCheck,
};
use sqlx::PgPool;
use uuid::Uuid;

fn order_created(body: Vec<u8>) -> OutboundMessage {
    OutboundMessage::persistent_json(
        ORDERS_EXCHANGE,
        ORDER_CREATED_ROUTING_KEY,
        ORDER_CREATED_EVENT_TYPE,
        body,
    )
}

fn order_created_body() -> Vec<u8> {
    let request: NewOrder = serde_json::from_value(common::order_body(2, 99.99)).unwrap();
    OrderCreatedEvent::from(&Order::place(Uuid::new_v4(), request, common::fixed_now()))
        .to_json()
        .unwrap()
}

#[tokio::test]
async fn test_worker_metrics_report_consumer_outcomes() {
    // Arrange
    let channel = InMemoryEventChannel::with_order_topology();
    channel.publish(order_created(order_created_body())).await.unwrap();
    channel.publish(order_created(order_created_body())).await.unwrap();
    channel.publish(order_created(b"not json".to_vec())).await.unwrap();

    let consumer = Consumer::new(
        Arc::new(channel.source(NOTIFICATIONS_QUEUE)),
        Arc::new(NotificationService::new(
            Arc::new(RecordingNotificationSink::new()),
            common::fixed_clock(),
            Duration::ZERO,
        )),
        DeliveryPolicy::default(),
        Duration::from_millis(5),
    );
    let mut outcomes = Vec::new();
    while let Some(outcome) = consumer.process_next().await.unwrap() {
        outcomes.push(outcome);
    }

    let metrics = PipelineMetrics::new()
        .unwrap()
        .with_consumer(NOTIFICATIONS_QUEUE, consumer.stats());
    let app = common::build_worker_app(
        HealthProbes::new("notification-worker").with("mq", Arc::new(StaticHealthCheck::healthy())),
        metrics,
    );

    // Act
    let (_, _, first) = common::get_text(app.clone(), "/metrics").await;
    let (status, content_type, body) = common::get_text(app, "/metrics").await;

    // Assert
    assert_eq!(
        outcomes,
        vec![Outcome::Acked, Outcome::Acked, Outcome::Dropped]
    );
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/plain"));
    let settled = |text: &str, outcome: &str| {
        common::sample(
            text,
            "orderline_consumer_messages_total",
            &[("queue", NOTIFICATIONS_QUEUE), ("outcome", outcome)],
        )
    };
    assert_eq!(settled(&first, "acked"), Some(2));
    assert_eq!(settled(&body, "acked"), Some(2), "scraping twice does not double count");
    assert_eq!(settled(&body, "dropped"), Some(1));
    assert_eq!(settled(&body, "requeued"), Some(0));
    assert_eq!(settled(&body, "dead_lettered"), Some(0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_order_metrics_report_queue_depth(pool: PgPool) {
    // Arrange
    let channel = PgEventChannel::new(pool.clone());
    declare_order_topology(&channel).await.unwrap();
    channel.publish(order_created(order_created_body())).await.unwrap();
    let app = common::build_order_app(
        pool,
        Arc::new(RecordingPublisher::new()),
        PublishMode::Detached,
    );

    // Act
    let (status, _, body) = common::get_text(app, "/metrics").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    for queue in [ANALYTICS_QUEUE, NOTIFICATIONS_QUEUE] {
        assert_eq!(
            common::sample(&body, "orderline_queue_depth", &[("queue", queue)]),
            Some(1),
            "{queue}"
        );
        assert_eq!(
            common::sample(&body, "orderline_queue_dead_letters", &[("queue", queue)]),
            Some(0),
            "{queue}"
        );
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_analytics_app_serves_metrics(pool: PgPool) {
    // Arrange
    let (app, _) = common::build_analytics_app(pool);

    // Act
    let (status, content_type, _) = common::get_text(app, "/metrics").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/plain"));
}
