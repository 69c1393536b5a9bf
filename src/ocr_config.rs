//! # OCR Configuration Module
//!
//! This module defines configuration structures for OCR processing,
//! including engine parameters, upload size limits and timeouts.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "eng";
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

/// OCR Engine Mode for Tesseract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineMode {
    /// Legacy engine only
    LegacyOnly = 0,
    /// Neural nets LSTM engine only
    LstmOnly = 1,
    /// Legacy + LSTM engines
    LegacyLstm = 2,
    /// Whatever is available, neural and legacy combined where possible
    #[default]
    Default = 3,
}

impl EngineMode {
    /// Convert OEM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMode::LegacyOnly => "0",
            EngineMode::LstmOnly => "1",
            EngineMode::LegacyLstm => "2",
            EngineMode::Default => "3",
        }
    }
}

impl FromStr for EngineMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(EngineMode::LegacyOnly),
            "1" => Ok(EngineMode::LstmOnly),
            "2" => Ok(EngineMode::LegacyLstm),
            "3" => Ok(EngineMode::Default),
            other => Err(AppError::Config(format!(
                "Invalid OCR engine mode '{}', expected 0-3",
                other
            ))),
        }
    }
}

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSegMode {
    /// Orientation and script detection (OSD) only
    OsdOnly = 0,
    /// Automatic page segmentation with OSD
    AutoOsd = 1,
    /// Automatic page segmentation, no OSD
    AutoNoOsd = 2,
    /// Fully automatic page segmentation
    Auto = 3,
    /// Assume a single column of text
    SingleColumn = 4,
    /// Assume a single uniform block of vertically aligned text
    SingleBlockVert = 5,
    /// Assume a single uniform block of text
    #[default]
    SingleBlock = 6,
    /// Treat the image as a single text line
    SingleLine = 7,
    /// Treat the image as a single word
    SingleWord = 8,
    /// Treat the image as a single word in a circle
    WordInCircle = 9,
    /// Treat the image as a single character
    SingleChar = 10,
    /// Find as much text as possible in no particular order
    SparseText = 11,
    /// Sparse text with OSD
    SparseTextOsd = 12,
    /// Treat the image as a single text line, bypassing hacks that are Tesseract-specific
    RawLine = 13,
}

impl PageSegMode {
    const ALL: [PageSegMode; 14] = [
        PageSegMode::OsdOnly,
        PageSegMode::AutoOsd,
        PageSegMode::AutoNoOsd,
        PageSegMode::Auto,
        PageSegMode::SingleColumn,
        PageSegMode::SingleBlockVert,
        PageSegMode::SingleBlock,
        PageSegMode::SingleLine,
        PageSegMode::SingleWord,
        PageSegMode::WordInCircle,
        PageSegMode::SingleChar,
        PageSegMode::SparseText,
        PageSegMode::SparseTextOsd,
        PageSegMode::RawLine,
    ];

    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::OsdOnly => "0",
            PageSegMode::AutoOsd => "1",
            PageSegMode::AutoNoOsd => "2",
            PageSegMode::Auto => "3",
            PageSegMode::SingleColumn => "4",
            PageSegMode::SingleBlockVert => "5",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SingleLine => "7",
            PageSegMode::SingleWord => "8",
            PageSegMode::WordInCircle => "9",
            PageSegMode::SingleChar => "10",
            PageSegMode::SparseText => "11",
            PageSegMode::SparseTextOsd => "12",
            PageSegMode::RawLine => "13",
        }
    }
}

impl FromStr for PageSegMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        PageSegMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == value)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Invalid page segmentation mode '{}', expected 0-13",
                    value
                ))
            })
    }
}

/// Parameters passed to the engine on every extraction call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OcrRequestConfig {
    pub engine_mode: EngineMode,
    pub page_seg_mode: PageSegMode,
}

impl OcrRequestConfig {
    /// Renders the parameters as Tesseract command-line flags.
    ///
    /// # Examples
    ///
    /// ```
    /// use scantext::ocr_config::OcrRequestConfig;
    ///
    /// assert_eq!(OcrRequestConfig::default().to_args(), "--oem 3 --psm 6");
    /// ```
    pub fn to_args(&self) -> String {
        format!(
            "--oem {} --psm {}",
            self.engine_mode.as_str(),
            self.page_seg_mode.as_str()
        )
    }
}

/// Format-specific file size limits for accepted upload formats
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSizeLimits {
    /// PNG format limit (higher due to better compression)
    pub png_max: u64,
    /// JPEG format limit (moderate due to lossy compression)
    pub jpeg_max: u64,
}

impl Default for FormatSizeLimits {
    fn default() -> Self {
        Self {
            png_max: 15 * 1024 * 1024,  // 15MB for PNG
            jpeg_max: 10 * 1024 * 1024, // 10MB for JPEG
        }
    }
}

impl FormatSizeLimits {
    /// Validate format size limits
    pub fn validate(&self) -> AppResult<()> {
        if self.png_max == 0 {
            return Err(AppError::Config(
                "png_max must be greater than 0".to_string(),
            ));
        }
        if self.jpeg_max == 0 {
            return Err(AppError::Config(
                "jpeg_max must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Largest accepted upload in bytes, across formats
    pub fn largest(&self) -> u64 {
        self.png_max.max(self.jpeg_max)
    }
}

/// Configuration structure for OCR processing
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    /// OCR language codes (e.g., "eng", "eng+fra", "deu")
    pub languages: String,
    /// Directory holding `*.traineddata`; the engine default when `None`
    pub tessdata_path: Option<String>,
    /// Engine and page segmentation modes
    pub request: OcrRequestConfig,
    /// Timeout for processing one upload, OCR included, in seconds
    pub operation_timeout_secs: u64,
    /// Format-specific size limits
    pub format_limits: FormatSizeLimits,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            tessdata_path: None,
            request: OcrRequestConfig::default(),
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            format_limits: FormatSizeLimits::default(),
        }
    }
}

impl OcrConfig {
    /// Validate OCR configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.languages.trim().is_empty() {
            return Err(AppError::Config("languages cannot be empty".to_string()));
        }
        if self
            .languages
            .split('+')
            .any(|lang| lang.is_empty() || !lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        {
            return Err(AppError::Config(format!(
                "languages must be '+'-separated codes, got '{}'",
                self.languages
            )));
        }
        if let Some(path) = &self.tessdata_path {
            if path.trim().is_empty() {
                return Err(AppError::Config(
                    "tessdata_path cannot be empty when set".to_string(),
                ));
            }
        }
        if self.request.engine_mode != EngineMode::Default {
            return Err(AppError::Config(format!(
                "engine mode {} is not supported, only {} is",
                self.request.engine_mode.as_str(),
                EngineMode::Default.as_str()
            )));
        }
        if self.operation_timeout_secs == 0 {
            return Err(AppError::Config(
                "operation_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.format_limits.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request_args() {
        let request = OcrRequestConfig::default();
        assert_eq!(request.engine_mode, EngineMode::Default);
        assert_eq!(request.page_seg_mode, PageSegMode::SingleBlock);
        assert_eq!(request.to_args(), "--oem 3 --psm 6");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("6".parse::<PageSegMode>().unwrap(), PageSegMode::SingleBlock);
        assert_eq!(" 13 ".parse::<PageSegMode>().unwrap(), PageSegMode::RawLine);
        assert!("14".parse::<PageSegMode>().is_err());
        assert_eq!("1".parse::<EngineMode>().unwrap(), EngineMode::LstmOnly);
        assert!("lstm".parse::<EngineMode>().is_err());
    }

    #[test]
    #[allow(unused_assignments)]
    fn test_format_size_limits_validation() {
        let mut config = FormatSizeLimits::default();

        // Valid config should pass
        assert!(config.validate().is_ok());
        assert_eq!(config.largest(), 15 * 1024 * 1024);

        config.png_max = 0;
        assert!(config.validate().is_err());
        config.png_max = 15 * 1024 * 1024;

        config.jpeg_max = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ocr_config_validation() {
        assert!(OcrConfig::default().validate().is_ok());

        let multi = OcrConfig {
            languages: "eng+fra".to_string(),
            ..Default::default()
        };
        assert!(multi.validate().is_ok());

        let empty = OcrConfig {
            languages: "  ".to_string(),
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let malformed = OcrConfig {
            languages: "eng++fra".to_string(),
            ..Default::default()
        };
        assert!(malformed.validate().is_err());

        let no_timeout = OcrConfig {
            operation_timeout_secs: 0,
            ..Default::default()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn test_only_default_engine_mode_is_accepted() {
        for mode in [
            EngineMode::LegacyOnly,
            EngineMode::LstmOnly,
            EngineMode::LegacyLstm,
        ] {
            let mut config = OcrConfig::default();
            config.request.engine_mode = mode;
            assert!(
                matches!(config.validate(), Err(AppError::Config(_))),
                "{:?} should be rejected",
                mode
            );
        }
    }
}
