//! Tracing subscriber and OpenTelemetry export.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::AppError;

/// Flushes and shuts down span export when dropped.
#[must_use = "dropping the guard stops span export"]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("error shutting down tracer provider: {e}");
            }
        }
    }
}

/// Installs the global subscriber: an `EnvFilter` (default `info`), JSON
/// log lines, and an OTLP span exporter when `otlp_endpoint` is set.
///
/// # Errors
///
/// Returns `AppError::Telemetry` if the exporter cannot be built or a
/// subscriber is already installed.
pub fn init(
    service: &'static str,
    otlp_endpoint: Option<&str>,
) -> Result<TelemetryGuard, AppError> {
    let provider = otlp_endpoint
        .map(|endpoint| tracer_provider(service, endpoint))
        .transpose()?;

    let otel_layer = provider
        .as_ref()
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer(service)));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .with(otel_layer)
        .try_init()
        .map_err(|e| AppError::Telemetry(e.to_string()))?;

    if let Some(endpoint) = otlp_endpoint {
        tracing::info!(service, otlp_endpoint = endpoint, "OpenTelemetry export enabled");
    }

    Ok(TelemetryGuard { provider })
}

fn tracer_provider(service: &'static str, endpoint: &str) -> Result<SdkTracerProvider, AppError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| AppError::Telemetry(e.to_string()))?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(Resource::builder().with_service_name(service).build())
        .build())
}
