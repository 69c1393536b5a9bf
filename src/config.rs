//! # Unified Application Configuration
//!
//! This module provides a centralized configuration system that consolidates
//! all application settings into a single, structured configuration object.
//! It supports loading from environment variables, validation, and provides
//! a clean interface for accessing configuration throughout the application.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::batch::BatchPolicy;
use crate::errors::{AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use crate::ocr_config::OcrConfig;
use crate::preprocessing::{PipelineProfile, StageConfig};
use crate::text_processing::NormalizerConfig;

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Upper bound on a whole multipart request body
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_request_bytes: 50 * 1024 * 1024, // 50MB
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.host.trim().is_empty() {
            return Err(AppError::Config("HOST cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(AppError::Config("PORT cannot be 0".to_string()));
        }
        if self.max_request_bytes == 0 {
            return Err(AppError::Config(
                "MAX_REQUEST_BYTES must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Preprocessing recipe and its constants
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineConfig {
    pub profile: PipelineProfile,
    pub stages: StageConfig,
}

/// Batch orchestration settings
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// What happens to the batch when one item fails
    pub policy: BatchPolicy,
    /// Items processed at the same time
    pub max_concurrency: usize,
    /// Uploads accepted in one request
    pub max_files: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            policy: BatchPolicy::default(),
            max_concurrency: 1,
            max_files: 10,
        }
    }
}

impl BatchConfig {
    /// Validate batch configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.max_concurrency == 0 {
            return Err(AppError::Config(
                "BATCH_CONCURRENCY must be greater than 0".to_string(),
            ));
        }
        if self.max_files == 0 {
            return Err(AppError::Config(
                "MAX_FILES_PER_BATCH must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Optional persistence of uploads and results
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub enabled: bool,
    /// Directory holding `raw/`, `processed/` and `text/`
    pub root: PathBuf,
    /// Files older than this are deleted by the retention sweep
    pub retention_hours: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root: PathBuf::from("data"),
            retention_hours: 24,
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.enabled && self.root.as_os_str().is_empty() {
            return Err(AppError::Config(
                "STORAGE_ROOT cannot be empty when storage is enabled".to_string(),
            ));
        }
        if self.retention_hours == 0 {
            return Err(AppError::Config(
                "STORAGE_RETENTION_HOURS must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// OCR processing configuration
    pub ocr: OcrConfig,
    /// Preprocessing configuration
    pub pipeline: PipelineConfig,
    /// Text normalization configuration
    pub normalizer: NormalizerConfig,
    /// Batch orchestration configuration
    pub batch: BatchConfig,
    /// Persistence configuration
    pub storage: StorageConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: '{}'", key, raw))),
        _ => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Server
        config.server.host = lookup("HOST").unwrap_or(config.server.host);
        config.server.port = parse_or(&lookup, "PORT", config.server.port)?;
        config.server.max_request_bytes =
            parse_or(&lookup, "MAX_REQUEST_BYTES", config.server.max_request_bytes)?;

        // OCR
        if let Some(languages) = lookup("OCR_LANGUAGES") {
            config.ocr.languages = languages;
        }
        config.ocr.tessdata_path = lookup("TESSDATA_PATH").filter(|p| !p.trim().is_empty());
        config.ocr.operation_timeout_secs =
            parse_or(&lookup, "OCR_TIMEOUT_SECS", config.ocr.operation_timeout_secs)?;

        // Pipeline: an explicit stage list wins over the named profile
        config.pipeline.profile = match lookup("PIPELINE_STAGES") {
            Some(list) if !list.trim().is_empty() => PipelineProfile::parse_stage_list(&list)
                .map_err(|e| AppError::Config(format!("PIPELINE_STAGES: {}", e)))?,
            _ => parse_or(&lookup, "PIPELINE_PROFILE", PipelineProfile::Minimal)
                .map_err(|_| {
                    AppError::Config(
                        "PIPELINE_PROFILE must be 'minimal' or 'extended'".to_string(),
                    )
                })?,
        };

        // Text normalization
        config.normalizer.collapse_whitespace = parse_or(
            &lookup,
            "NORMALIZE_COLLAPSE_WHITESPACE",
            config.normalizer.collapse_whitespace,
        )?;

        // Batch
        config.batch.policy = parse_or(&lookup, "BATCH_POLICY", config.batch.policy)?;
        config.batch.max_concurrency =
            parse_or(&lookup, "BATCH_CONCURRENCY", config.batch.max_concurrency)?;
        config.batch.max_files = parse_or(&lookup, "MAX_FILES_PER_BATCH", config.batch.max_files)?;

        // Storage
        config.storage.enabled = parse_or(&lookup, "STORAGE_ENABLED", config.storage.enabled)?;
        if let Some(root) = lookup("STORAGE_ROOT") {
            config.storage.root = PathBuf::from(root);
        }
        config.storage.retention_hours = parse_or(
            &lookup,
            "STORAGE_RETENTION_HOURS",
            config.storage.retention_hours,
        )?;

        // Observability
        config.observability = ObservabilityConfig::from_lookup(&lookup)?;

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.server.validate()?;
        self.ocr.validate()?;
        self.pipeline
            .stages
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.normalizer.validate()?;
        self.batch.validate()?;
        self.storage.validate()?;
        self.observability.validate()?;

        if (self.server.max_request_bytes as u64) < self.ocr.format_limits.largest() {
            return Err(AppError::Config(format!(
                "MAX_REQUEST_BYTES ({}) must be at least the largest per-file limit ({})",
                self.server.max_request_bytes,
                self.ocr.format_limits.largest()
            )));
        }
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: bind={}, ocr_languages={}, ocr_args='{}', pipeline_stages={}, batch_policy={:?}, concurrency={}, storage_enabled={}, metrics_enabled={}",
            self.server.bind_address(),
            self.ocr.languages,
            self.ocr.request.to_args(),
            self.pipeline.profile.stages().len(),
            self.batch.policy,
            self.batch.max_concurrency,
            self.storage.enabled,
            self.observability.enable_metrics_export
        )
    }
}
