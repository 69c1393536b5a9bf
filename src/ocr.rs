//! # OCR Processing Module
//!
//! This module provides optical character recognition (OCR) for preprocessed
//! pages using the Tesseract OCR engine.
//!
//! ## Features
//!
//! - `TextExtractor` trait so the engine can be swapped (tests use a fake)
//! - Stateless Tesseract adapter: one engine per call, nothing shared
//! - Engine availability probe for readiness checks
//!
//! ## Dependencies
//!
//! - `leptess`: Rust bindings for Tesseract OCR and Leptonica
//! - `image`: In-memory PNG encoding of the binarized page

use leptess::LepTess;
use tracing::{debug, warn};

use crate::preprocessing::PixelBuffer;

pub use crate::ocr_config::{EngineMode, OcrConfig, OcrRequestConfig, PageSegMode};
pub use crate::ocr_errors::OcrError;

/// Turns a binarized page into raw text.
///
/// Implementations must be safe to call from several blocking threads at
/// once; each call stands alone.
pub trait TextExtractor: Send + Sync {
    /// Extracts the text of `image`, trimmed of leading and trailing whitespace.
    fn extract(&self, image: &PixelBuffer, request: &OcrRequestConfig)
        -> Result<String, OcrError>;
}

/// Tesseract-backed extractor.
///
/// # Examples
///
/// ```no_run
/// use scantext::ocr::{OcrConfig, TesseractExtractor, TextExtractor};
/// use scantext::preprocessing::PixelBuffer;
///
/// let config = OcrConfig::default();
/// let extractor = TesseractExtractor::new(&config);
/// let page = PixelBuffer::new(100, 40, 1, vec![255; 4000]).unwrap();
/// let text = extractor.extract(&page, &config.request).unwrap();
/// println!("{}", text);
/// ```
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    languages: String,
    tessdata_path: Option<String>,
}

impl TesseractExtractor {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            languages: config.languages.clone(),
            tessdata_path: config.tessdata_path.clone(),
        }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }

    fn create_engine(&self, request: &OcrRequestConfig) -> Result<LepTess, OcrError> {
        // LepTess always initializes the engine in its default mode.
        if request.engine_mode != EngineMode::Default {
            return Err(OcrError::Initialization(format!(
                "engine mode {} is not supported, only {} is",
                request.engine_mode.as_str(),
                EngineMode::Default.as_str()
            )));
        }

        let mut tess = LepTess::new(self.tessdata_path.as_deref(), &self.languages).map_err(|e| {
            OcrError::Unavailable(format!(
                "Failed to initialize Tesseract for '{}': {}",
                self.languages, e
            ))
        })?;

        tess.set_variable(
            leptess::Variable::TesseditPagesegMode,
            request.page_seg_mode.as_str(),
        )
        .map_err(|e| OcrError::Initialization(format!("Failed to set PSM mode: {}", e)))?;

        Ok(tess)
    }
}

impl TextExtractor for TesseractExtractor {
    fn extract(
        &self,
        image: &PixelBuffer,
        request: &OcrRequestConfig,
    ) -> Result<String, OcrError> {
        let start = std::time::Instant::now();

        let png = image
            .encode_png()
            .map_err(|e| OcrError::ImageLoad(format!("Failed to encode page as PNG: {}", e)))?;

        let mut tess = self.create_engine(request)?;
        tess.set_image_from_mem(&png).map_err(|e| {
            OcrError::ImageLoad(format!("Failed to load image for OCR: {}", e))
        })?;

        let text = tess.get_utf8_text().map_err(|e| {
            OcrError::Extraction(format!("Failed to extract text from image: {}", e))
        })?;

        let elapsed = start.elapsed();
        crate::observability::record_ocr_duration(elapsed);
        debug!(
            languages = %self.languages,
            args = %request.to_args(),
            duration_ms = elapsed.as_millis() as u64,
            chars = text.len(),
            "OCR extraction completed"
        );

        Ok(text.trim().to_string())
    }
}

/// Checks that the engine starts with the configured languages.
///
/// # Errors
///
/// Returns `OcrError::Unavailable` when Tesseract or its language data is
/// missing.
pub fn check_engine_available(config: &OcrConfig) -> Result<(), OcrError> {
    match LepTess::new(config.tessdata_path.as_deref(), &config.languages) {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!(languages = %config.languages, error = %e, "OCR engine unavailable");
            Err(OcrError::Unavailable(format!(
                "Tesseract could not load '{}': {}",
                config.languages, e
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_engine_mode_is_rejected_before_init() {
        let extractor = TesseractExtractor::new(&OcrConfig::default());
        let page = PixelBuffer::new(8, 8, 1, vec![255; 64]).unwrap();
        let request = OcrRequestConfig {
            engine_mode: EngineMode::LstmOnly,
            ..Default::default()
        };

        let result = extractor.extract(&page, &request);
        assert!(matches!(result, Err(OcrError::Initialization(_))));
    }

    #[test]
    fn test_missing_language_data_is_unavailable() {
        let config = OcrConfig {
            languages: "zzz_not_installed".to_string(),
            tessdata_path: Some("/nonexistent/tessdata".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            check_engine_available(&config),
            Err(OcrError::Unavailable(_))
        ));
    }
}
