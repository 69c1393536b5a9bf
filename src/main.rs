use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use scantext::batch::BatchProcessor;
use scantext::config::AppConfig;
use scantext::errors::error_logging;
use scantext::observability;
use scantext::ocr::TesseractExtractor;
use scantext::server::{create_router, AppState};
use scantext::storage::UploadStore;
use tracing::{info, warn};

const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Load and validate configuration at startup
fn load_configuration() -> Result<AppConfig> {
    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    config.validate().map_err(|e| {
        anyhow::anyhow!(
            "Configuration validation failed: {}. Please check your environment variables.",
            e
        )
    })?;

    Ok(config)
}

/// Periodically delete stored uploads older than the retention window
fn spawn_retention_task(store: Arc<UploadStore>, retention: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RETENTION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let store = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || store.purge_expired(retention)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "Retention sweep failed"),
                Err(e) => error_logging::log_internal_error(&e, "storage", "retention_sweep"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = load_configuration()?;

    // Initialize observability (tracing, metrics)
    let metrics_handle = observability::init_observability_with_config(&config.observability)?;
    info!("{}", config.summary());

    let store = if config.storage.enabled {
        let store = Arc::new(UploadStore::new(config.storage.root.clone())?);
        spawn_retention_task(
            Arc::clone(&store),
            Duration::from_secs(config.storage.retention_hours * 3600),
        );
        Some(store)
    } else {
        None
    };

    let extractor = Arc::new(TesseractExtractor::new(&config.ocr));
    let processor = BatchProcessor::from_config(&config, extractor, store)?;

    let state = AppState::new(processor, config.ocr.clone(), metrics_handle);
    let app = create_router(state, config.server.max_request_bytes);

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", address, e))?;
    info!(address = %address, "OCR service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
