//! Orderline — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orderline_core::error::PipelineError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Startup and runtime errors for the services.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Event channel topology could not be declared.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// A metric family could not be registered.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Tracing or exporter setup failed.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `PipelineError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            PipelineError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation_error"),
            PipelineError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            PipelineError::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error")
            }
            PipelineError::Transport(_) => (StatusCode::SERVICE_UNAVAILABLE, "transport_error"),
            PipelineError::Parse(_) | PipelineError::Handler(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        // Store details stay in the log.
        let message = match &self.0 {
            PipelineError::Persistence(_) => {
                error!(error = %self.0, "request failed on the order store");
                "the request could not be completed, nothing was stored".to_owned()
            }
            PipelineError::Parse(_) | PipelineError::Handler(_) => {
                error!(error = %self.0, "request failed");
                "internal error".to_owned()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: error_code,
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use uuid::Uuid;

    fn status_of(err: PipelineError) -> StatusCode {
        let response = ApiError(err).into_response();
        response.status()
    }

    async fn body_of(err: PipelineError) -> serde_json::Value {
        let response = ApiError(err).into_response();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_validation_maps_to_400() {
        assert_eq!(
            status_of(PipelineError::validation("quantity", "must be greater than 0")),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_not_found_maps_to_404() {
        assert_eq!(
            status_of(PipelineError::NotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_persistence_maps_to_500() {
        assert_eq!(
            status_of(PipelineError::Persistence("db down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_transport_maps_to_503() {
        assert_eq!(
            status_of(PipelineError::Transport("cache down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_validation_body_names_field() {
        let json = body_of(PipelineError::validation("customer_id", "is required")).await;

        assert_eq!(json["error"], "validation_error");
        assert_eq!(json["message"], "invalid customer_id: is required");
    }

    #[tokio::test]
    async fn test_persistence_body_hides_details() {
        let json = body_of(PipelineError::Persistence("password=hunter2".into())).await;

        assert_eq!(json["error"], "persistence_error");
        assert!(!json["message"].as_str().unwrap().contains("hunter2"));
    }
}
