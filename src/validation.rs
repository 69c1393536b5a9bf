//! Validation module for incoming uploads
//!
//! A batch is validated as a whole before any image is decoded, so a bad
//! upload anywhere in the batch rejects the request without doing OCR work:
//!
//! - Batch is non-empty and within the file count limit
//! - Declared media type is JPEG or PNG
//! - Size is non-zero and within the per-format limit

use crate::errors::{AppError, AppResult};
use crate::ocr_config::FormatSizeLimits;

/// Media types accepted for upload.
pub const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

/// One uploaded file as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Client-supplied file name, used as the item identifier
    pub filename: String,
    /// Declared media type, if the client sent one
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.map(str::to_string),
            bytes,
        }
    }

    /// Declared media type without parameters, lowercased.
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_deref().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

/// Validates a single upload's media type and size
///
/// # Examples
/// ```
/// use scantext::ocr_config::FormatSizeLimits;
/// use scantext::validation::{validate_upload, Upload};
///
/// let limits = FormatSizeLimits::default();
/// let png = Upload::new("scan.png", Some("image/png"), vec![1, 2, 3]);
/// assert!(validate_upload(&png, &limits).is_ok());
///
/// let gif = Upload::new("anim.gif", Some("image/gif"), vec![1, 2, 3]);
/// assert!(validate_upload(&gif, &limits).is_err());
/// ```
pub fn validate_upload(upload: &Upload, limits: &FormatSizeLimits) -> AppResult<()> {
    let media_type = upload.media_type();
    let limit = match media_type.as_deref() {
        Some("image/png") => limits.png_max,
        Some("image/jpeg") => limits.jpeg_max,
        _ => {
            return Err(AppError::Validation(format!(
                "Invalid file type for {}. Only JPEG and PNG are supported.",
                upload.filename
            )))
        }
    };

    let size = upload.bytes.len() as u64;
    if size == 0 {
        return Err(AppError::Validation(format!(
            "File {} is empty.",
            upload.filename
        )));
    }
    if size > limit {
        return Err(AppError::Validation(format!(
            "File {} is too large: {} bytes (maximum allowed: {} bytes).",
            upload.filename, size, limit
        )));
    }

    Ok(())
}

/// Validates every upload of a batch before any is processed
pub fn validate_batch(
    uploads: &[Upload],
    limits: &FormatSizeLimits,
    max_files: usize,
) -> AppResult<()> {
    if uploads.is_empty() {
        return Err(AppError::Validation("No files uploaded.".to_string()));
    }
    if uploads.len() > max_files {
        return Err(AppError::Validation(format!(
            "Too many files: {} (maximum allowed: {}).",
            uploads.len(),
            max_files
        )));
    }

    uploads
        .iter()
        .try_for_each(|upload| validate_upload(upload, limits))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> Upload {
        Upload::new(name, Some("image/png"), vec![0x89, b'P', b'N', b'G'])
    }

    #[test]
    fn test_media_type_strips_parameters() {
        let upload = Upload::new("a.jpg", Some("Image/JPEG; charset=binary"), vec![1]);
        assert_eq!(upload.media_type().as_deref(), Some("image/jpeg"));
        assert!(validate_upload(&upload, &FormatSizeLimits::default()).is_ok());
    }

    #[test]
    fn test_missing_content_type_is_rejected() {
        let upload = Upload::new("a.png", None, vec![1]);
        let err = validate_upload(&upload, &FormatSizeLimits::default()).unwrap_err();
        assert!(err.to_string().contains("Invalid file type for a.png"));
    }

    #[test]
    fn test_size_limits() {
        let limits = FormatSizeLimits {
            png_max: 4,
            jpeg_max: 2,
        };
        assert!(validate_upload(&png("ok.png"), &limits).is_ok());

        let big_jpeg = Upload::new("big.jpg", Some("image/jpeg"), vec![0; 3]);
        assert!(validate_upload(&big_jpeg, &limits).is_err());

        let empty = Upload::new("empty.png", Some("image/png"), Vec::new());
        assert!(validate_upload(&empty, &limits).is_err());
    }

    #[test]
    fn test_batch_rules() {
        let limits = FormatSizeLimits::default();
        assert!(matches!(
            validate_batch(&[], &limits, 10),
            Err(AppError::Validation(_))
        ));
        assert!(validate_batch(&[png("a"), png("b")], &limits, 1).is_err());
        assert!(validate_batch(&[png("a"), png("b")], &limits, 2).is_ok());

        let mixed = vec![png("a"), Upload::new("b.txt", Some("text/plain"), vec![1])];
        let err = validate_batch(&mixed, &limits, 10).unwrap_err();
        assert!(err.to_string().contains("b.txt"));
    }
}
