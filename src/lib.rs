//! # scantext
//!
//! An OCR service for scanned documents. Uploaded JPEG and PNG images are
//! cleaned up by a fixed preprocessing pipeline (grayscale, upscale, adaptive
//! threshold, morphology, denoise, sharpen), read with Tesseract and returned
//! as normalized text.

pub mod batch;
pub mod config;
pub mod decoding;
pub mod errors;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod preprocessing;
pub mod server;
pub mod storage;
pub mod text_processing;
pub mod validation;

// Re-export types for easier access
pub use batch::{BatchOutcome, BatchPolicy, BatchProcessor, ExtractionRecord, ItemFailure};
pub use config::AppConfig;
pub use errors::{AppError, AppResult};
pub use ocr::{TesseractExtractor, TextExtractor};
pub use preprocessing::{PipelineProfile, PixelBuffer, PreprocessingPipeline, Stage};
pub use text_processing::TextNormalizer;
pub use validation::Upload;
