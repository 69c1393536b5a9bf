//! # OCR Error Types Module
//!
//! This module defines the error type returned by text extractors.

/// Custom error types for OCR operations
#[derive(Debug, Clone, PartialEq)]
pub enum OcrError {
    /// OCR engine or its language data cannot be found
    Unavailable(String),
    /// OCR engine initialization errors
    Initialization(String),
    /// Image could not be handed to the engine
    ImageLoad(String),
    /// Text extraction errors
    Extraction(String),
    /// Timeout errors
    Timeout(String),
}

impl OcrError {
    /// Whether the same call could succeed if tried again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OcrError::Unavailable(_) | OcrError::Timeout(_))
    }
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrError::Unavailable(msg) => {
                write!(f, "[OCR_UNAVAILABLE] OCR engine is not available: {}", msg)
            }
            OcrError::Initialization(msg) => {
                write!(f, "[OCR_INIT] OCR engine initialization failed: {}", msg)
            }
            OcrError::ImageLoad(msg) => {
                write!(f, "[IMAGE_LOAD] Failed to load image for OCR processing: {}", msg)
            }
            OcrError::Extraction(msg) => {
                write!(f, "[OCR_EXTRACT] Text extraction from image failed: {}", msg)
            }
            OcrError::Timeout(msg) => write!(f, "[OCR_TIMEOUT] OCR processing timed out: {}", msg),
        }
    }
}

impl std::error::Error for OcrError {}

impl From<anyhow::Error> for OcrError {
    fn from(err: anyhow::Error) -> Self {
        OcrError::Extraction(err.to_string())
    }
}
