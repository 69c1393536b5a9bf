//! # Batch Processing
//!
//! Drives a batch of uploads through decode, preprocessing, OCR and text
//! normalization. The whole batch is validated before any image is touched;
//! each image then runs on the blocking thread pool under a timeout.
//!
//! Two failure policies are supported:
//! - `FailFast`: the first failing image aborts the batch
//! - `Isolate`: failures are reported per image next to the successes

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::{AppConfig, BatchConfig};
use crate::decoding::decode_image;
use crate::errors::{error_logging, AppError, AppResult};
use crate::observability;
use crate::ocr::{OcrError, OcrRequestConfig, TextExtractor};
use crate::ocr_config::FormatSizeLimits;
use crate::preprocessing::{PreprocessingError, PreprocessingPipeline};
use crate::storage::{SavedPaths, UploadStore};
use crate::text_processing::TextNormalizer;
use crate::validation::{validate_batch, Upload};

/// What a failing image does to the rest of its batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Abort the batch and report the failing image
    #[default]
    FailFast,
    /// Keep going and report failures alongside results
    Isolate,
}

impl FromStr for BatchPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_fast" | "failfast" => Ok(BatchPolicy::FailFast),
            "isolate" => Ok(BatchPolicy::Isolate),
            other => Err(AppError::Config(format!(
                "BATCH_POLICY must be 'fail_fast' or 'isolate', got '{}'",
                other
            ))),
        }
    }
}

/// Text extracted from one upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionRecord {
    pub filename: String,
    pub extracted_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<SavedPaths>,
}

/// An upload that could not be processed, under the isolate policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub filename: String,
    pub stage: String,
    pub error: String,
    pub retryable: bool,
}

impl ItemFailure {
    fn from_error(filename: &str, err: &AppError) -> Self {
        Self {
            filename: err.identifier().unwrap_or(filename).to_string(),
            stage: err.stage().to_string(),
            error: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Results of a batch, in upload order
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BatchOutcome {
    pub results: Vec<ExtractionRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ItemFailure>,
}

/// Everything one image needs, shared by the worker tasks
#[derive(Clone)]
struct ItemProcessor {
    pipeline: PreprocessingPipeline,
    extractor: Arc<dyn TextExtractor>,
    normalizer: TextNormalizer,
    store: Option<Arc<UploadStore>>,
    request: OcrRequestConfig,
}

impl ItemProcessor {
    fn process(&self, upload: &Upload) -> AppResult<ExtractionRecord> {
        let span = observability::item_span(&upload.filename);
        let _entered = span.enter();
        let start = Instant::now();

        let result = self.run_stages(upload);
        match &result {
            Ok(record) => {
                observability::record_item("success");
                info!(
                    chars = record.extracted_text.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Upload processed"
                );
            }
            Err(e) => {
                observability::record_item("failure");
                error_logging::log_item_error(
                    e,
                    &upload.filename,
                    e.stage(),
                    Some(upload.bytes.len()),
                    Some(start.elapsed()),
                );
            }
        }
        result
    }

    fn run_stages(&self, upload: &Upload) -> AppResult<ExtractionRecord> {
        let id = upload.filename.as_str();

        let image = decode_image(&upload.bytes).map_err(|e| AppError::decode(id, &e))?;
        let processed = self
            .pipeline
            .run(image)
            .map_err(|e: PreprocessingError| AppError::preprocessing(id, &e))?;

        let raw_text = self
            .extractor
            .extract(&processed, &self.request)
            .map_err(|e| AppError::extraction(id, &e))?;
        let extracted_text = self.normalizer.normalize(&raw_text);

        // Only completed items are persisted, all three artifacts together
        let paths = match &self.store {
            Some(store) => {
                let name = store.reserve_name(id)?;
                Some(SavedPaths {
                    raw: store.save_raw(&name, &upload.bytes)?,
                    processed: store.save_processed(&name, &processed)?,
                    text: store.save_text(&name, &extracted_text)?,
                })
            }
            None => None,
        };

        Ok(ExtractionRecord {
            filename: upload.filename.clone(),
            extracted_text,
            paths,
        })
    }
}

/// Validates and processes batches of uploads
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use scantext::batch::BatchProcessor;
/// use scantext::ocr::{OcrConfig, TesseractExtractor};
/// use scantext::preprocessing::PreprocessingPipeline;
/// use scantext::validation::Upload;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let extractor = Arc::new(TesseractExtractor::new(&OcrConfig::default()));
/// let processor = BatchProcessor::new(PreprocessingPipeline::minimal(), extractor);
///
/// let bytes = std::fs::read("invoice.png")?;
/// let outcome = processor
///     .process(vec![Upload::new("invoice.png", Some("image/png"), bytes)])
///     .await?;
/// println!("{}", outcome.results[0].extracted_text);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BatchProcessor {
    items: Arc<ItemProcessor>,
    limits: FormatSizeLimits,
    config: BatchConfig,
    timeout: Duration,
}

impl BatchProcessor {
    /// Creates a processor with default normalization, limits and policy.
    pub fn new(pipeline: PreprocessingPipeline, extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            items: Arc::new(ItemProcessor {
                pipeline,
                extractor,
                normalizer: TextNormalizer::default(),
                store: None,
                request: OcrRequestConfig::default(),
            }),
            limits: FormatSizeLimits::default(),
            config: BatchConfig::default(),
            timeout: Duration::from_secs(crate::ocr_config::DEFAULT_OPERATION_TIMEOUT_SECS),
        }
    }

    /// Builds a processor from application configuration.
    pub fn from_config(
        config: &AppConfig,
        extractor: Arc<dyn TextExtractor>,
        store: Option<Arc<UploadStore>>,
    ) -> AppResult<Self> {
        let pipeline = PreprocessingPipeline::new(
            config.pipeline.profile.clone(),
            config.pipeline.stages.clone(),
        )
        .map_err(|e| AppError::Config(e.to_string()))?;
        let normalizer = TextNormalizer::new(config.normalizer.clone())?;

        Ok(Self {
            items: Arc::new(ItemProcessor {
                pipeline,
                extractor,
                normalizer,
                store,
                request: config.ocr.request,
            }),
            limits: config.ocr.format_limits.clone(),
            config: config.batch.clone(),
            timeout: Duration::from_secs(config.ocr.operation_timeout_secs),
        })
    }

    fn items_mut(&mut self) -> &mut ItemProcessor {
        // Clones only if a clone of this processor already shares the items
        Arc::make_mut(&mut self.items)
    }

    pub fn with_normalizer(mut self, normalizer: TextNormalizer) -> Self {
        self.items_mut().normalizer = normalizer;
        self
    }

    pub fn with_store(mut self, store: Arc<UploadStore>) -> Self {
        self.items_mut().store = Some(store);
        self
    }

    pub fn with_request(mut self, request: OcrRequestConfig) -> Self {
        self.items_mut().request = request;
        self
    }

    pub fn with_limits(mut self, limits: FormatSizeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_batch_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.config
    }

    /// Processes one upload synchronously on the calling thread.
    ///
    /// Skips batch validation and the per-item timeout. The store, when set,
    /// is written exactly as in [`BatchProcessor::process`].
    pub fn process_upload(&self, upload: &Upload) -> AppResult<ExtractionRecord> {
        self.items.process(upload)
    }

    /// Validates and processes a batch.
    ///
    /// # Errors
    ///
    /// - `AppError::Validation` if any upload fails validation; nothing is processed
    /// - Under `FailFast`, the first item error (decode, preprocessing,
    ///   extraction, storage) with the item's identifier
    pub async fn process(&self, uploads: Vec<Upload>) -> AppResult<BatchOutcome> {
        let start = Instant::now();

        if let Err(e) = validate_batch(&uploads, &self.limits, self.config.max_files) {
            error_logging::log_validation_error(&e, "validate_batch", "upload", None);
            observability::record_batch("rejected");
            return Err(e);
        }

        let total = uploads.len();
        let mut slots: Vec<Option<(String, AppResult<ExtractionRecord>)>> = vec![None; total];
        let mut pending = uploads.into_iter().enumerate();
        let mut running = JoinSet::new();

        loop {
            while running.len() < self.config.max_concurrency {
                match pending.next() {
                    Some((index, upload)) => {
                        running.spawn(run_item(
                            Arc::clone(&self.items),
                            index,
                            upload,
                            self.timeout,
                        ));
                    }
                    None => break,
                }
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            let (index, filename, result) = joined.map_err(|e| {
                error_logging::log_internal_error(&e, "batch", "join_item");
                AppError::Internal(format!("Item task failed: {}", e))
            })?;

            if let Err(e) = &result {
                if self.config.policy == BatchPolicy::FailFast {
                    running.abort_all();
                    observability::record_batch("failure");
                    warn!(
                        identifier = ?e.identifier(),
                        stage = %e.stage(),
                        "Batch aborted on first failure"
                    );
                    return Err(e.clone());
                }
            }
            slots[index] = Some((filename, result));
        }

        let mut outcome = BatchOutcome::default();
        for (filename, result) in slots.into_iter().flatten() {
            match result {
                Ok(record) => outcome.results.push(record),
                Err(e) => outcome
                    .failures
                    .push(ItemFailure::from_error(&filename, &e)),
            }
        }

        observability::record_batch(if outcome.failures.is_empty() {
            "success"
        } else {
            "partial"
        });
        info!(
            items = total,
            succeeded = outcome.results.len(),
            failed = outcome.failures.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch processed"
        );

        Ok(outcome)
    }
}

/// Runs one item on the blocking pool and enforces the timeout around it.
///
/// An expired item keeps running in the background; its result is dropped.
async fn run_item(
    items: Arc<ItemProcessor>,
    index: usize,
    upload: Upload,
    timeout: Duration,
) -> (usize, String, AppResult<ExtractionRecord>) {
    let filename = upload.filename.clone();
    let task = tokio::task::spawn_blocking(move || items.process(&upload));

    let result = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            error_logging::log_internal_error(&join_error, "batch", "process_item");
            Err(AppError::Internal(format!(
                "Processing task for {} failed: {}",
                filename, join_error
            )))
        }
        Err(_) => {
            let err = AppError::extraction(
                &filename,
                &OcrError::Timeout(format!(
                    "processing exceeded {} seconds",
                    timeout.as_secs_f64()
                )),
            );
            observability::record_item("timeout");
            error_logging::log_item_error(&err, &filename, err.stage(), None, Some(timeout));
            Err(err)
        }
    };

    (index, filename, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("fail_fast".parse::<BatchPolicy>().unwrap(), BatchPolicy::FailFast);
        assert_eq!("Fail-Fast".parse::<BatchPolicy>().unwrap(), BatchPolicy::FailFast);
        assert_eq!("isolate".parse::<BatchPolicy>().unwrap(), BatchPolicy::Isolate);
        assert!("retry".parse::<BatchPolicy>().is_err());
        assert_eq!(BatchPolicy::default(), BatchPolicy::FailFast);
    }

    #[test]
    fn test_outcome_serialization_omits_empty_failures() {
        let outcome = BatchOutcome {
            results: vec![ExtractionRecord {
                filename: "a.png".to_string(),
                extracted_text: "hello".to_string(),
                paths: None,
            }],
            failures: Vec::new(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"results": [{"filename": "a.png", "extracted_text": "hello"}]})
        );
    }

    #[test]
    fn test_item_failure_from_error() {
        let err = AppError::extraction("b.jpg", &OcrError::Timeout("slow".into()));
        let failure = ItemFailure::from_error("fallback", &err);
        assert_eq!(failure.filename, "b.jpg");
        assert_eq!(failure.stage, "extraction");
        assert!(failure.retryable);
    }
}
