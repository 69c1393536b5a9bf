//! # OCR Tests Module
//!
//! Configuration, request arguments and error classification of the OCR
//! adapter. Nothing here needs a Tesseract installation.

#[cfg(test)]
mod tests {
    use scantext::errors::AppError;
    use scantext::ocr::{
        EngineMode, OcrConfig, OcrError, OcrRequestConfig, PageSegMode, TesseractExtractor,
        TextExtractor,
    };
    use scantext::ocr_config::FormatSizeLimits;
    use scantext::preprocessing::PixelBuffer;

    /// Test OCR configuration defaults
    #[test]
    fn test_ocr_config_defaults() {
        let config = OcrConfig::default();

        assert_eq!(config.languages, "eng");
        assert_eq!(config.tessdata_path, None);
        assert_eq!(config.request.engine_mode, EngineMode::Default);
        assert_eq!(config.request.page_seg_mode, PageSegMode::SingleBlock);
        assert_eq!(config.operation_timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_request_arguments() {
        assert_eq!(OcrRequestConfig::default().to_args(), "--oem 3 --psm 6");

        let single_line = OcrRequestConfig {
            page_seg_mode: "7".parse().unwrap(),
            ..Default::default()
        };
        assert_eq!(single_line.to_args(), "--oem 3 --psm 7");
    }

    #[test]
    fn test_mode_parsing_rejects_out_of_range() {
        assert!("4".parse::<EngineMode>().is_err());
        assert!("14".parse::<PageSegMode>().is_err());
        assert!(matches!(
            "abc".parse::<PageSegMode>(),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_format_size_limits() {
        let limits = FormatSizeLimits::default();
        assert_eq!(limits.png_max, 15 * 1024 * 1024);
        assert_eq!(limits.jpeg_max, 10 * 1024 * 1024);
        assert_eq!(limits.largest(), limits.png_max);

        let zero = FormatSizeLimits {
            jpeg_max: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_error_retry_classification() {
        assert!(OcrError::Unavailable("no tessdata".into()).is_retryable());
        assert!(OcrError::Timeout("30s".into()).is_retryable());
        assert!(!OcrError::Initialization("bad mode".into()).is_retryable());
        assert!(!OcrError::ImageLoad("bad png".into()).is_retryable());
        assert!(!OcrError::Extraction("engine".into()).is_retryable());

        let app = AppError::extraction("scan.png", &OcrError::Unavailable("x".into()));
        assert!(app.is_retryable());
        assert_eq!(app.stage(), "extraction");
    }

    #[test]
    fn test_error_display_prefixes() {
        let err = OcrError::Timeout("after 30 seconds".into());
        assert_eq!(
            err.to_string(),
            "[OCR_TIMEOUT] OCR processing timed out: after 30 seconds"
        );
    }

    #[test]
    fn test_non_default_engine_mode_fails_without_engine() {
        let extractor = TesseractExtractor::new(&OcrConfig::default());
        let page = PixelBuffer::new(4, 4, 1, vec![255; 16]).unwrap();
        let request = OcrRequestConfig {
            engine_mode: EngineMode::LegacyOnly,
            ..Default::default()
        };

        let err = extractor.extract(&page, &request).unwrap_err();
        assert!(matches!(err, OcrError::Initialization(_)));
        assert!(!err.is_retryable());
    }
}
