//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Structured logging with configurable levels and formats
//! - Metrics collection and Prometheus rendering
//! - Recording helpers used by the pipeline, the OCR adapter and the batch processor

use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::prelude::*;

use crate::observability_config::{LogFormat, ObservabilityConfig};

/// Initialize the complete observability stack with custom configuration
///
/// Returns the Prometheus handle when metrics export is enabled.
pub fn init_observability_with_config(
    config: &ObservabilityConfig,
) -> Result<Option<PrometheusHandle>> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    init_tracing_with_config(config)?;
    let metrics_handle = init_metrics_with_config(config)?;

    tracing::info!(
        environment = %config.environment,
        metrics_enabled = %config.enable_metrics_export,
        "Observability stack initialized successfully"
    );
    Ok(metrics_handle)
}

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("scantext={}", config.log_level).parse()?)
        .add_directive(format!("ocr_preprocessing={}", config.log_level).parse()?)
        .add_directive("tower_http=info".parse()?);

    // Pretty for development, JSON for others
    match config.effective_log_format() {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?,
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Initialize metrics collection with a Prometheus recorder
pub fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<Option<PrometheusHandle>> {
    if !config.enable_metrics_export {
        tracing::info!("Metrics export disabled");
        return Ok(None);
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();

    tracing::info!("Metrics collection initialized");
    Ok(Some(handle))
}

fn describe_metrics() {
    metrics::describe_counter!("scantext_batches_total", "OCR batches by outcome");
    metrics::describe_counter!("scantext_items_total", "Uploaded images by outcome");
    metrics::describe_histogram!(
        "scantext_stage_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent in each preprocessing stage"
    );
    metrics::describe_histogram!(
        "scantext_ocr_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent inside the OCR engine per image"
    );
}

/// Create a span for one uploaded image
pub fn item_span(identifier: &str) -> tracing::Span {
    tracing::info_span!("ocr_item", identifier = %identifier)
}

/// Record the outcome of a whole batch
pub fn record_batch(outcome: &'static str) {
    metrics::counter!("scantext_batches_total", "outcome" => outcome).increment(1);
}

/// Record the outcome of a single image
pub fn record_item(outcome: &'static str) {
    metrics::counter!("scantext_items_total", "outcome" => outcome).increment(1);
}

/// Record the duration of one preprocessing stage
pub fn record_stage_duration(stage: &'static str, duration: Duration) {
    metrics::histogram!("scantext_stage_duration_seconds", "stage" => stage)
        .record(duration.as_secs_f64());
}

/// Record the duration of one OCR engine call
pub fn record_ocr_duration(duration: Duration) {
    metrics::histogram!("scantext_ocr_duration_seconds").record(duration.as_secs_f64());
}
