//! Shared test doubles and utilities for the Orderline order pipeline.

mod cache;
mod channel;
mod clock;
mod health;
mod metric_repository;
mod notification;
mod order_repository;
mod publisher;

pub use cache::FailingCache;
pub use channel::{InMemoryEventChannel, InMemoryQueueSource};
pub use clock::FixedClock;
pub use health::StaticHealthCheck;
pub use metric_repository::InMemoryMetricRepository;
pub use notification::RecordingNotificationSink;
pub use order_repository::{FailingOrderRepository, InMemoryOrderRepository};
pub use publisher::{FailingPublisher, RecordingPublisher};
