//! Orderline API — HTTP surfaces and process wiring for the order service,
//! the analytics service and the notification worker.

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod shutdown;
pub mod state;
pub mod telemetry;
