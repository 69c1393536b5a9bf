//! # Shared Types for Image Preprocessing
//!
//! This module contains the raster type that flows through the pipeline, the
//! immutable stage constants, and the error type shared by every stage.

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessingError {
    /// Buffer has a zero dimension or its storage does not match its dimensions
    EmptyImage {
        stage: String,
        width: u32,
        height: u32,
    },
    /// Buffer has a channel count the stage cannot handle
    InvalidChannels { stage: String, channels: u8 },
    /// Stage constants are out of range
    InvalidConfig { message: String },
    /// Image processing operation failed
    StageFailed { stage: String, message: String },
}

impl PreprocessingError {
    /// Name of the stage that rejected the buffer, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            PreprocessingError::EmptyImage { stage, .. }
            | PreprocessingError::InvalidChannels { stage, .. }
            | PreprocessingError::StageFailed { stage, .. } => Some(stage),
            PreprocessingError::InvalidConfig { .. } => None,
        }
    }

    /// Re-attributes a buffer error to `stage`.
    pub fn at_stage(self, stage: &str) -> Self {
        match self {
            PreprocessingError::EmptyImage { width, height, .. } => {
                PreprocessingError::EmptyImage {
                    stage: stage.to_string(),
                    width,
                    height,
                }
            }
            PreprocessingError::InvalidChannels { channels, .. } => {
                PreprocessingError::InvalidChannels {
                    stage: stage.to_string(),
                    channels,
                }
            }
            PreprocessingError::StageFailed { message, .. } => PreprocessingError::StageFailed {
                stage: stage.to_string(),
                message,
            },
            other => other,
        }
    }
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::EmptyImage {
                stage,
                width,
                height,
            } => {
                write!(
                    f,
                    "Stage '{}' received a degenerate {}x{} buffer",
                    stage, width, height
                )
            }
            PreprocessingError::InvalidChannels { stage, channels } => {
                write!(
                    f,
                    "Stage '{}' cannot process a buffer with {} channel(s)",
                    stage, channels
                )
            }
            PreprocessingError::InvalidConfig { message } => {
                write!(f, "Invalid preprocessing configuration: {}", message)
            }
            PreprocessingError::StageFailed { stage, message } => {
                write!(f, "Stage '{}' failed: {}", stage, message)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// In-memory raster image with a fixed width, height and channel count.
///
/// Pixels are stored row-major, one byte per channel. Only 1 (grayscale) and
/// 3 (RGB) channel buffers exist; the constructors refuse anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Builds a buffer from raw row-major bytes.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::EmptyImage` for zero dimensions or a storage
    /// length that does not match, and `InvalidChannels` for channel counts
    /// other than 1 or 3.
    pub fn new(
        width: u32,
        height: u32,
        channels: u8,
        data: Vec<u8>,
    ) -> Result<Self, PreprocessingError> {
        if channels != 1 && channels != 3 {
            return Err(PreprocessingError::InvalidChannels {
                stage: "input".to_string(),
                channels,
            });
        }
        let expected = width as usize * height as usize * channels as usize;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(PreprocessingError::EmptyImage {
                stage: "input".to_string(),
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Wraps a grayscale image.
    pub fn from_gray(image: GrayImage) -> Result<Self, PreprocessingError> {
        let (width, height) = image.dimensions();
        Self::new(width, height, 1, image.into_raw())
    }

    /// Wraps an RGB image.
    pub fn from_rgb(image: RgbImage) -> Result<Self, PreprocessingError> {
        let (width, height) = image.dimensions();
        Self::new(width, height, 3, image.into_raw())
    }

    /// Converts a decoded image of any pixel layout.
    ///
    /// 8-bit grayscale stays single-channel; everything else (alpha, 16-bit,
    /// float) is flattened to 8-bit RGB.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, PreprocessingError> {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::from_gray(gray),
            other => Self::from_rgb(other.to_rgb8()),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Returns `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw row-major pixel bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// True when every byte is either 0 or 255.
    pub fn is_binary(&self) -> bool {
        self.data.iter().all(|&v| v == 0 || v == 255)
    }

    /// Consumes a single-channel buffer into an `image` grayscale buffer.
    pub fn into_gray(self, stage: &str) -> Result<GrayImage, PreprocessingError> {
        self.ensure_valid(stage)?;
        if self.channels != 1 {
            return Err(PreprocessingError::InvalidChannels {
                stage: stage.to_string(),
                channels: self.channels,
            });
        }
        GrayImage::from_raw(self.width, self.height, self.data).ok_or_else(|| {
            PreprocessingError::StageFailed {
                stage: stage.to_string(),
                message: "pixel storage does not match dimensions".to_string(),
            }
        })
    }

    /// Copies the buffer into a `DynamicImage` for encoding.
    pub fn to_dynamic(&self) -> Option<DynamicImage> {
        match self.channels {
            1 => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8),
            _ => None,
        }
    }

    /// Encodes the buffer as an in-memory PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let image = self.to_dynamic().ok_or_else(|| {
            image::ImageError::Parameter(image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ))
        })?;
        let mut output = Vec::new();
        image.write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)?;
        Ok(output)
    }

    /// Checks the buffer invariants on behalf of `stage`.
    pub fn ensure_valid(&self, stage: &str) -> Result<(), PreprocessingError> {
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        if self.width == 0 || self.height == 0 || self.data.len() != expected {
            return Err(PreprocessingError::EmptyImage {
                stage: stage.to_string(),
                width: self.width,
                height: self.height,
            });
        }
        if self.channels != 1 && self.channels != 3 {
            return Err(PreprocessingError::InvalidChannels {
                stage: stage.to_string(),
                channels: self.channels,
            });
        }
        Ok(())
    }
}

/// Rectangular structuring element for morphological stages.
///
/// The anchor sits at `(width / 2, height / 2)`, so a 2x2 element covers the
/// pixel itself plus its left, upper and upper-left neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuringElement {
    pub width: u32,
    pub height: u32,
}

impl StructuringElement {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Offsets `(dx, dy)` covered by the element relative to its anchor.
    pub fn offsets(&self) -> Vec<(i64, i64)> {
        let ax = (self.width / 2) as i64;
        let ay = (self.height / 2) as i64;
        let mut offsets = Vec::with_capacity((self.width * self.height) as usize);
        for ky in 0..self.height as i64 {
            for kx in 0..self.width as i64 {
                offsets.push((kx - ax, ky - ay));
            }
        }
        offsets
    }
}

/// Immutable constants for every preprocessing stage.
///
/// A pipeline run only ever reads these values, so two runs over the same
/// input with the same `StageConfig` produce byte-identical output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Images narrower than this are upscaled to exactly this width
    pub min_width: u32,
    /// Largest buffer, in pixels, the upscale stage may produce
    pub max_output_pixels: u64,
    /// Side of the square Gaussian smoothing kernel (odd)
    pub blur_kernel: u32,
    /// Side of the local window used by adaptive thresholding (odd, >= 3)
    pub threshold_block_size: u32,
    /// Constant subtracted from the local weighted mean
    pub threshold_offset: i32,
    /// Multiplier applied by the contrast stage
    pub contrast_gain: f32,
    /// Offset added by the contrast stage
    pub contrast_bias: f32,
    /// Element used by the closing stage
    pub closing_element: StructuringElement,
    /// Side of the median filter window (odd)
    pub median_kernel: u32,
    /// Row-major 3x3 sharpening kernel
    pub sharpen_kernel: [i32; 9],
    /// Element used by the stroke reconnection stage
    pub reconnect_element: StructuringElement,
}

impl StageConfig {
    pub const DEFAULT_MIN_WIDTH: u32 = 1000;
    pub const DEFAULT_MAX_OUTPUT_PIXELS: u64 = 40_000_000;
    pub const DEFAULT_BLUR_KERNEL: u32 = 5;
    pub const DEFAULT_THRESHOLD_BLOCK_SIZE: u32 = 11;
    pub const DEFAULT_THRESHOLD_OFFSET: i32 = 2;
    pub const DEFAULT_CONTRAST_GAIN: f32 = 1.5;
    pub const DEFAULT_MEDIAN_KERNEL: u32 = 3;
    pub const SHARPEN_KERNEL: [i32; 9] = [-1, -1, -1, -1, 9, -1, -1, -1, -1];

    /// Validate stage constants
    pub fn validate(&self) -> Result<(), PreprocessingError> {
        if self.min_width == 0 {
            return Err(PreprocessingError::InvalidConfig {
                message: "min_width must be greater than 0".to_string(),
            });
        }
        if self.max_output_pixels < self.min_width as u64 {
            return Err(PreprocessingError::InvalidConfig {
                message: format!(
                    "max_output_pixels must be at least min_width ({}), got {}",
                    self.min_width, self.max_output_pixels
                ),
            });
        }
        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return Err(PreprocessingError::InvalidConfig {
                message: format!("blur_kernel must be odd, got {}", self.blur_kernel),
            });
        }
        if self.threshold_block_size < 3 || self.threshold_block_size % 2 == 0 {
            return Err(PreprocessingError::InvalidConfig {
                message: format!(
                    "threshold_block_size must be odd and >= 3, got {}",
                    self.threshold_block_size
                ),
            });
        }
        if self.median_kernel == 0 || self.median_kernel % 2 == 0 {
            return Err(PreprocessingError::InvalidConfig {
                message: format!("median_kernel must be odd, got {}", self.median_kernel),
            });
        }
        if !self.contrast_gain.is_finite() || !self.contrast_bias.is_finite() {
            return Err(PreprocessingError::InvalidConfig {
                message: "contrast gain and bias must be finite".to_string(),
            });
        }
        for (name, element) in [
            ("closing_element", self.closing_element),
            ("reconnect_element", self.reconnect_element),
        ] {
            if element.width == 0 || element.height == 0 {
                return Err(PreprocessingError::InvalidConfig {
                    message: format!("{} must not be empty", name),
                });
            }
        }
        Ok(())
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            min_width: Self::DEFAULT_MIN_WIDTH,
            max_output_pixels: Self::DEFAULT_MAX_OUTPUT_PIXELS,
            blur_kernel: Self::DEFAULT_BLUR_KERNEL,
            threshold_block_size: Self::DEFAULT_THRESHOLD_BLOCK_SIZE,
            threshold_offset: Self::DEFAULT_THRESHOLD_OFFSET,
            contrast_gain: Self::DEFAULT_CONTRAST_GAIN,
            contrast_bias: 0.0,
            closing_element: StructuringElement::new(2, 2),
            median_kernel: Self::DEFAULT_MEDIAN_KERNEL,
            sharpen_kernel: Self::SHARPEN_KERNEL,
            reconnect_element: StructuringElement::new(2, 2),
        }
    }
}

/// Per-stage timing and output shape recorded by a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    /// Stage name
    pub stage: &'static str,
    /// Output dimensions (width, height)
    pub dimensions: (u32, u32),
    /// Output channel count
    pub channels: u8,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}
