//! # Image Thresholding Module
//!
//! This module provides binary thresholding for OCR preprocessing. The threshold
//! is chosen per pixel from a Gaussian-weighted neighbourhood, which copes with
//! uneven lighting and shadows across a scanned page.

use tracing;

use super::filtering::{convolve_separable, gaussian_kernel, Border};
use super::types::{PixelBuffer, PreprocessingError};

/// Applies adaptive Gaussian thresholding to convert an image to binary.
///
/// The local mean around each pixel is a Gaussian-weighted average over a
/// `block_size` x `block_size` window (edge pixels replicated, mean rounded to
/// an integer). A pixel becomes white (255) when it is strictly greater than
/// `mean - offset`, and black (0) otherwise.
///
/// # Arguments
///
/// * `image` - Single-channel input buffer
/// * `block_size` - Side of the neighbourhood window, odd and at least 3
/// * `offset` - Constant subtracted from the local mean
///
/// # Examples
///
/// ```
/// use scantext::preprocessing::{apply_adaptive_threshold, PixelBuffer};
///
/// let page = PixelBuffer::new(4, 1, 1, vec![250, 250, 30, 250]).unwrap();
/// let binary = apply_adaptive_threshold(page, 3, 2).unwrap();
/// assert!(binary.is_binary());
/// assert_eq!(binary.as_bytes()[2], 0);
/// ```
///
/// # Errors
///
/// Returns `PreprocessingError` if the buffer is degenerate, not grayscale, or
/// the block size is invalid.
pub fn apply_adaptive_threshold(
    image: PixelBuffer,
    block_size: u32,
    offset: i32,
) -> Result<PixelBuffer, PreprocessingError> {
    const STAGE: &str = "adaptive_threshold";

    if block_size < 3 || block_size % 2 == 0 {
        return Err(PreprocessingError::StageFailed {
            stage: STAGE.to_string(),
            message: format!("Invalid block size: {}. Must be odd and >= 3", block_size),
        });
    }

    let gray = image.into_gray(STAGE)?;
    let (width, height) = gray.dimensions();
    let kernel = gaussian_kernel(block_size);
    let means = convolve_separable(&gray, &kernel, Border::Replicate);

    let binary: Vec<u8> = gray
        .as_raw()
        .iter()
        .zip(means)
        .map(|(&value, mean)| {
            let mean = mean.round().clamp(0.0, 255.0) as i32;
            if value as i32 > mean - offset {
                255u8
            } else {
                0u8
            }
        })
        .collect();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Adaptive thresholding completed: block={}, offset={}, dimensions={}x{}",
        block_size,
        offset,
        width,
        height
    );

    PixelBuffer::new(width, height, 1, binary)
}
