//! # HTTP Server
//!
//! axum router for the OCR service:
//!
//! - `GET /` welcome message
//! - `POST /ocr` multipart batch upload (repeated `files` field)
//! - `GET /health/live`, `GET /health/ready` probes
//! - `GET /metrics` Prometheus text, when metrics export is enabled

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::batch::{BatchOutcome, BatchProcessor};
use crate::errors::{error_logging, AppError};
use crate::ocr::{check_engine_available, OcrConfig};
use crate::validation::Upload;

/// Multipart field carrying the uploaded images
pub const FILES_FIELD: &str = "files";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub processor: BatchProcessor,
    pub ocr_config: OcrConfig,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        processor: BatchProcessor,
        ocr_config: OcrConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            processor,
            ocr_config,
            metrics,
        }
    }
}

/// Error returned by handlers, rendered as `{"detail": "..."}`
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::Validation(_) | AppError::Decode { .. } => StatusCode::BAD_REQUEST,
            AppError::Preprocessing { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Extraction { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn detail(&self) -> String {
        match &self.0 {
            // Validation messages are shown to clients verbatim
            AppError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "detail": self.detail() }));
        (status, body).into_response()
    }
}

/// Builds the router with request tracing and a body size cap.
pub fn create_router(state: AppState, max_request_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/ocr", post(ocr_batch))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the OCR Service" }))
}

async fn ocr_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchOutcome>, ApiError> {
    let mut uploads = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                error_logging::log_validation_error(&e, "read_multipart", "multipart", None);
                return Err(AppError::Validation(format!("Malformed multipart body: {}", e)).into());
            }
        };

        if field.name() != Some(FILES_FIELD) {
            debug!(field = ?field.name(), "Ignoring unexpected multipart field");
            continue;
        }

        let filename = field.file_name().unwrap_or("unnamed_file").to_string();
        let content_type = field.content_type().map(|ct| ct.to_string());
        let bytes = field.bytes().await.map_err(|e| {
            error_logging::log_validation_error(&e, "read_file", "multipart", Some(&filename));
            AppError::Validation(format!("Failed to read {}: {}", filename, e))
        })?;

        uploads.push(Upload::new(filename, content_type.as_deref(), bytes.to_vec()));
    }

    info!(files = uploads.len(), "Received OCR batch");
    let outcome = state.processor.process(uploads).await?;
    Ok(Json(outcome))
}

async fn health_live() -> &'static str {
    "OK"
}

async fn health_ready(State(state): State<AppState>) -> Response {
    let config = state.ocr_config.clone();
    match tokio::task::spawn_blocking(move || check_engine_available(&config)).await {
        Ok(Ok(())) => (StatusCode::OK, "OK").into_response(),
        Ok(Err(e)) => {
            warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
        Err(e) => {
            error_logging::log_internal_error(&e, "server", "health_ready");
            (StatusCode::SERVICE_UNAVAILABLE, "readiness check failed").into_response()
        }
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics export disabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr_errors::OcrError;
    use crate::preprocessing::PreprocessingError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                AppError::decode("a.png", &crate::decoding::DecodeError::Empty),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::preprocessing(
                    "a.png",
                    &PreprocessingError::InvalidConfig {
                        message: "bad".into(),
                    },
                ),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::extraction("a.png", &OcrError::Unavailable("gone".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (AppError::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Internal("bug".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn test_validation_detail_is_verbatim() {
        let err = ApiError(AppError::Validation("No files uploaded.".into()));
        assert_eq!(err.detail(), "No files uploaded.");
    }
}
