//! # Image Scaling Module
//!
//! Guarantees a minimum working resolution before binarization. Narrow images
//! are enlarged with cubic interpolation; wide images are never downscaled.

use image::imageops::FilterType;

use super::types::{PixelBuffer, PreprocessingError};

/// Conditional upscaler for OCR input.
#[derive(Debug, Clone)]
pub struct ImageScaler {
    /// Images narrower than this are scaled up to exactly this width.
    min_width: u32,
    /// Upper bound on `width * height` of the scaled buffer.
    max_output_pixels: u64,
}

impl ImageScaler {
    /// Default minimum working width in pixels.
    pub const DEFAULT_MIN_WIDTH: u32 = 1000;

    /// Default cap on the scaled buffer size (40 megapixels).
    pub const DEFAULT_MAX_OUTPUT_PIXELS: u64 = 40_000_000;

    /// Creates a new ImageScaler with the default minimum width (1000 pixels).
    ///
    /// # Examples
    ///
    /// ```
    /// use scantext::preprocessing::ImageScaler;
    ///
    /// let scaler = ImageScaler::new();
    /// assert_eq!(scaler.min_width(), 1000);
    /// ```
    pub fn new() -> Self {
        Self {
            min_width: Self::DEFAULT_MIN_WIDTH,
            max_output_pixels: Self::DEFAULT_MAX_OUTPUT_PIXELS,
        }
    }

    /// Creates a new ImageScaler with a custom minimum width.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::InvalidConfig` if `min_width` is zero.
    pub fn with_min_width(min_width: u32) -> Result<Self, PreprocessingError> {
        if min_width == 0 {
            return Err(PreprocessingError::InvalidConfig {
                message: "min_width must be greater than 0".to_string(),
            });
        }

        Ok(Self {
            min_width,
            max_output_pixels: Self::DEFAULT_MAX_OUTPUT_PIXELS,
        })
    }

    /// Creates a scaler with a custom minimum width and output size cap.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::InvalidConfig` if either value is zero.
    pub fn with_limits(min_width: u32, max_output_pixels: u64) -> Result<Self, PreprocessingError> {
        if max_output_pixels == 0 {
            return Err(PreprocessingError::InvalidConfig {
                message: "max_output_pixels must be greater than 0".to_string(),
            });
        }
        let mut scaler = Self::with_min_width(min_width)?;
        scaler.max_output_pixels = max_output_pixels;
        Ok(scaler)
    }

    /// Returns the configured minimum width.
    pub fn min_width(&self) -> u32 {
        self.min_width
    }

    pub fn max_output_pixels(&self) -> u64 {
        self.max_output_pixels
    }

    /// Computes the output dimensions for an input of `width` x `height`.
    ///
    /// Inputs at least `min_width` wide keep their size. Narrower inputs are
    /// scaled uniformly by `min_width / width`, rounding each side to the
    /// nearest pixel.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::StageFailed` when the result would exceed
    /// `max_output_pixels` or its height does not fit in a `u32`.
    pub fn target_dimensions(
        &self,
        width: u32,
        height: u32,
    ) -> Result<(u32, u32), PreprocessingError> {
        let (new_width, new_height) = if width >= self.min_width {
            (width, height)
        } else {
            let scale_factor = self.min_width as f64 / width as f64;
            let scaled_height = (height as f64 * scale_factor).round().max(1.0);
            if scaled_height > u32::MAX as f64 {
                return Err(PreprocessingError::StageFailed {
                    stage: "upscale".to_string(),
                    message: format!(
                        "{}x{} cannot be scaled to width {}: height overflows",
                        width, height, self.min_width
                    ),
                });
            }
            let new_width = (width as f64 * scale_factor).round() as u32;
            (new_width, scaled_height as u32)
        };

        let pixels = new_width as u64 * new_height as u64;
        if pixels > self.max_output_pixels {
            return Err(PreprocessingError::StageFailed {
                stage: "upscale".to_string(),
                message: format!(
                    "{}x{} would become {}x{} ({} pixels), above the limit of {}",
                    width, height, new_width, new_height, pixels, self.max_output_pixels
                ),
            });
        }
        Ok((new_width, new_height))
    }

    /// Scales a single-channel buffer to the minimum working resolution.
    ///
    /// Uses Catmull-Rom (cubic) interpolation. Buffers that are already wide
    /// enough are returned untouched.
    ///
    /// # Errors
    ///
    /// Fails with `PreprocessingError` if the buffer is degenerate, not
    /// grayscale, or would exceed the output size cap.
    pub fn scale(&self, image: PixelBuffer) -> Result<PixelBuffer, PreprocessingError> {
        const STAGE: &str = "upscale";
        image.ensure_valid(STAGE)?;

        let (width, height) = image.dimensions();
        let (new_width, new_height) = self.target_dimensions(width, height)?;
        let gray = image.into_gray(STAGE)?;
        if (new_width, new_height) == (width, height) {
            return PixelBuffer::from_gray(gray);
        }

        let scaled = image::imageops::resize(&gray, new_width, new_height, FilterType::CatmullRom);

        tracing::debug!(
            target: "ocr_preprocessing",
            "Upscaled {}x{} -> {}x{}",
            width,
            height,
            new_width,
            new_height
        );

        PixelBuffer::from_gray(scaled)
    }
}

impl Default for ImageScaler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_buffer(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::new(width, height, 1, vec![200; (width * height) as usize]).unwrap()
    }

    #[test]
    fn test_new_scaler() {
        let scaler = ImageScaler::new();
        assert_eq!(scaler.min_width(), 1000);
    }

    #[test]
    fn test_with_invalid_min_width() {
        assert!(matches!(
            ImageScaler::with_min_width(0),
            Err(PreprocessingError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_wide_image_is_unchanged() {
        let scaler = ImageScaler::new();
        let scaled = scaler.scale(gray_buffer(1200, 40)).unwrap();
        assert_eq!(scaled.dimensions(), (1200, 40));
    }

    #[test]
    fn test_narrow_image_reaches_min_width() {
        let scaler = ImageScaler::new();
        let scaled = scaler.scale(gray_buffer(300, 200)).unwrap();
        assert_eq!(scaled.dimensions(), (1000, 667));
    }

    #[test]
    fn test_target_dimensions_rounding() {
        let scaler = ImageScaler::new();
        assert_eq!(scaler.target_dimensions(999, 1).unwrap(), (1000, 1));
        assert_eq!(scaler.target_dimensions(3, 1).unwrap(), (1000, 333));
        assert_eq!(scaler.target_dimensions(1000, 5).unwrap(), (1000, 5));
    }

    #[test]
    fn test_tall_narrow_input_exceeds_pixel_cap() {
        let scaler = ImageScaler::new();
        let err = scaler.target_dimensions(10, 100_000).unwrap_err();
        assert!(matches!(
            err,
            PreprocessingError::StageFailed { ref stage, .. } if stage == "upscale"
        ));

        // A few KB on the wire, rejected before any allocation
        let sliver = gray_buffer(10, 100_000);
        assert!(matches!(
            scaler.scale(sliver),
            Err(PreprocessingError::StageFailed { .. })
        ));
    }

    #[test]
    fn test_height_overflow_is_rejected() {
        let scaler = ImageScaler::with_limits(1000, u64::MAX).unwrap();
        assert!(matches!(
            scaler.target_dimensions(1, 5_000_000),
            Err(PreprocessingError::StageFailed { .. })
        ));
        // Just under the cap still scales
        let scaler = ImageScaler::with_limits(1000, 1000 * 500).unwrap();
        assert_eq!(scaler.target_dimensions(2, 1).unwrap(), (1000, 500));
        assert!(scaler.target_dimensions(2, 2).is_err());
    }

    #[test]
    fn test_with_limits_rejects_zero_cap() {
        assert!(ImageScaler::with_limits(1000, 0).is_err());
    }

    #[test]
    fn test_scale_rejects_color_input() {
        let scaler = ImageScaler::new();
        let rgb = PixelBuffer::new(10, 10, 3, vec![0; 300]).unwrap();
        assert!(matches!(
            scaler.scale(rgb),
            Err(PreprocessingError::InvalidChannels { .. })
        ));
    }
}
