//! # Image Preprocessing Module
//!
//! This module turns a decoded scan into a binarized raster tuned for the OCR
//! engine. Stages are small functions over [`PixelBuffer`] and the pipeline
//! strings them together in a fixed order.
//!
//! The module is organized into focused sub-modules:
//! - `grayscale`: Color to luminance conversion
//! - `scaling`: Conditional upscaling to a minimum working width
//! - `filtering`: Blur, contrast, median, sharpening and morphological operations
//! - `thresholding`: Adaptive Gaussian binarization
//! - `pipeline`: Stage list, profiles and the pipeline runner
//! - `types`: Shared types and error definitions

pub mod filtering;
pub mod grayscale;
pub mod pipeline;
pub mod scaling;
pub mod thresholding;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use types::{PixelBuffer, PreprocessingError, StageConfig, StageReport, StructuringElement};

pub use filtering::{
    adjust_contrast, apply_morphological_operation, gaussian_blur, median_denoise, sharpen,
    MorphologicalOperation,
};
pub use grayscale::to_grayscale;
pub use pipeline::{PipelineProfile, PreprocessingPipeline, Stage};
pub use scaling::ImageScaler;
pub use thresholding::apply_adaptive_threshold;
