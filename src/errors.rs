//! # Application Error Types
//!
//! This module defines common error types used throughout the scantext service.
//! Per-item errors carry the upload's identifier and the failing stage so
//! callers can decide whether to retry, skip or abort.

use std::fmt;

use crate::decoding::DecodeError;
use crate::ocr_errors::OcrError;
use crate::preprocessing::PreprocessingError;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Request validation errors (file count, media type, size)
    Validation(String),
    /// Upload bytes are not a decodable image
    Decode { identifier: String, message: String },
    /// A preprocessing stage rejected the image
    Preprocessing {
        identifier: String,
        stage: String,
        message: String,
    },
    /// The OCR engine failed or timed out
    Extraction {
        identifier: String,
        message: String,
        retryable: bool,
    },
    /// File persistence errors
    Storage(String),
    /// Internal application errors
    Internal(String),
}

impl AppError {
    pub fn decode(identifier: &str, err: &DecodeError) -> Self {
        AppError::Decode {
            identifier: identifier.to_string(),
            message: err.to_string(),
        }
    }

    pub fn preprocessing(identifier: &str, err: &PreprocessingError) -> Self {
        AppError::Preprocessing {
            identifier: identifier.to_string(),
            stage: err.stage().unwrap_or("pipeline").to_string(),
            message: err.to_string(),
        }
    }

    pub fn extraction(identifier: &str, err: &OcrError) -> Self {
        AppError::Extraction {
            identifier: identifier.to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Extraction { retryable, .. } => *retryable,
            AppError::Storage(_) | AppError::Internal(_) => true,
            _ => false,
        }
    }

    /// Identifier of the upload the error belongs to, if any.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            AppError::Decode { identifier, .. }
            | AppError::Preprocessing { identifier, .. }
            | AppError::Extraction { identifier, .. } => Some(identifier),
            _ => None,
        }
    }

    /// Processing stage the error was raised in.
    pub fn stage(&self) -> &str {
        match self {
            AppError::Config(_) => "config",
            AppError::Validation(_) => "validation",
            AppError::Decode { .. } => "decode",
            AppError::Preprocessing { stage, .. } => stage,
            AppError::Extraction { .. } => "extraction",
            AppError::Storage(_) => "storage",
            AppError::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Decode {
                identifier,
                message,
            } => write!(f, "[DECODE] {}: {}", identifier, message),
            AppError::Preprocessing {
                identifier,
                stage,
                message,
            } => write!(f, "[PREPROCESSING] {} ({}): {}", identifier, stage, message),
            AppError::Extraction {
                identifier,
                message,
                ..
            } => write!(f, "[OCR] {}: {}", identifier, message),
            AppError::Storage(msg) => write!(f, "[STORAGE] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    /// Log a failed upload with its identifier and failing stage
    pub fn log_item_error(
        error: &impl std::fmt::Display,
        identifier: &str,
        stage: &str,
        image_size: Option<usize>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            identifier = %identifier,
            stage = %stage,
            image_size_bytes = ?image_size,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "Upload processing failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_storage_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        file_size: Option<u64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            file_size_bytes = ?file_size,
            "File system operation failed"
        );
    }

    /// Log validation errors with input context
    pub fn log_validation_error(
        error: &impl std::fmt::Display,
        operation: &str,
        input_type: &str,
        input_value: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            input_type = %input_type,
            input_value = ?input_value.map(|v| if v.chars().count() > 100 { format!("{}...", v.chars().take(100).collect::<String>()) } else { v.to_string() }),
            "Validation failed"
        );
    }

    /// Log internal application errors with component context
    pub fn log_internal_error(error: &impl std::fmt::Display, component: &str, operation: &str) {
        error!(
            error = %error,
            component = %component,
            operation = %operation,
            "Internal application error"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}
