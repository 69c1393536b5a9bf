//! # Image Decoding
//!
//! Turns uploaded bytes into a [`PixelBuffer`]. Only PNG and JPEG are
//! decoded; the format is taken from the file signature, never from the
//! declared media type.

use image::ImageFormat;
use tracing::debug;

use crate::preprocessing::PixelBuffer;

/// Formats the decoder accepts.
pub const SUPPORTED_FORMATS: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];

/// Errors raised while decoding upload bytes
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// No bytes at all
    Empty,
    /// Signature is unknown or not PNG/JPEG
    UnsupportedFormat(String),
    /// Signature matched but the data is corrupt or truncated
    Malformed(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Empty => write!(f, "image data is empty"),
            DecodeError::UnsupportedFormat(format) => {
                write!(f, "unsupported image format: {}", format)
            }
            DecodeError::Malformed(msg) => write!(f, "malformed image data: {}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Detects the format of `bytes` from its signature.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let format = image::guess_format(bytes)
        .map_err(|_| DecodeError::UnsupportedFormat("unrecognized signature".to_string()))?;
    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(DecodeError::UnsupportedFormat(format!("{:?}", format)));
    }
    Ok(format)
}

/// Decodes PNG or JPEG bytes into a grayscale or RGB buffer.
///
/// # Examples
///
/// ```
/// use scantext::decoding::{decode_image, DecodeError};
///
/// assert_eq!(decode_image(&[]), Err(DecodeError::Empty));
/// assert!(matches!(
///     decode_image(b"GIF89a...."),
///     Err(DecodeError::UnsupportedFormat(_))
/// ));
/// ```
pub fn decode_image(bytes: &[u8]) -> Result<PixelBuffer, DecodeError> {
    let format = detect_format(bytes)?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    debug!(
        format = ?format,
        width = decoded.width(),
        height = decoded.height(),
        "Decoded upload"
    );

    PixelBuffer::from_dynamic(decoded).map_err(|e| DecodeError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn test_decode_png_rgb() {
        let bytes = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(7, 3, image::Rgb([10, 20, 30]))),
            ImageFormat::Png,
        );
        let buffer = decode_image(&bytes).unwrap();
        assert_eq!(buffer.dimensions(), (7, 3));
        assert_eq!(buffer.channels(), 3);
        assert_eq!(&buffer.as_bytes()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_decode_jpeg() {
        let bytes = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, image::Rgb([200, 200, 200]))),
            ImageFormat::Jpeg,
        );
        assert_eq!(detect_format(&bytes).unwrap(), ImageFormat::Jpeg);
        assert_eq!(decode_image(&bytes).unwrap().dimensions(), (16, 16));
    }

    #[test]
    fn test_truncated_png_is_malformed() {
        let bytes = encode(
            DynamicImage::ImageRgb8(RgbImage::new(32, 32)),
            ImageFormat::Png,
        );
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            decode_image(truncated),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_signature() {
        assert!(matches!(
            decode_image(b"plain text, not an image"),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }
}
