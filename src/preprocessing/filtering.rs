//! # Image Filtering Module
//!
//! This module provides noise reduction, sharpening, contrast and morphological
//! operations for OCR preprocessing. All filters work on single-channel buffers
//! and produce a new buffer of the same size.

use image::GrayImage;
use tracing;

use super::types::{PixelBuffer, PreprocessingError, StructuringElement};

/// How samples outside the image are synthesized by convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Border {
    /// `dcb|abcd|cba`, the edge pixel itself is not repeated
    Reflect101,
    /// `aaa|abcd|ddd`
    Replicate,
}

impl Border {
    fn index(self, i: i64, len: i64) -> usize {
        if len == 1 {
            return 0;
        }
        match self {
            Border::Replicate => i.clamp(0, len - 1) as usize,
            Border::Reflect101 => {
                let mut i = i;
                // Kernels wider than the image need more than one reflection.
                while i < 0 || i >= len {
                    if i < 0 {
                        i = -i;
                    }
                    if i >= len {
                        i = 2 * (len - 1) - i;
                    }
                }
                i as usize
            }
        }
    }
}

/// Returns the normalized 1-D Gaussian kernel for an odd `size`.
///
/// Sizes up to 7 use the fixed binomial kernels; larger sizes derive sigma
/// from the size as `0.3 * ((size - 1) * 0.5 - 1) + 0.8`.
pub(crate) fn gaussian_kernel(size: u32) -> Vec<f32> {
    match size {
        1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![
            0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
        ],
        _ => {
            let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
            let center = (size / 2) as f64;
            let weights: Vec<f64> = (0..size)
                .map(|i| {
                    let x = i as f64 - center;
                    (-(x * x) / (2.0 * sigma * sigma)).exp()
                })
                .collect();
            let sum: f64 = weights.iter().sum();
            weights.iter().map(|w| (w / sum) as f32).collect()
        }
    }
}

/// Convolves `image` with `kernel` horizontally, then vertically.
///
/// Returns unrounded row-major results so callers decide how to quantize.
pub(crate) fn convolve_separable(image: &GrayImage, kernel: &[f32], border: Border) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);
    let radius = (kernel.len() / 2) as i64;
    let src = image.as_raw();

    let mut horizontal = vec![0f32; src.len()];
    for y in 0..h {
        let row = (y * w) as usize;
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = border.index(x + k as i64 - radius, w);
                acc += weight * src[row + sx] as f32;
            }
            horizontal[row + x as usize] = acc;
        }
    }

    let mut output = vec![0f32; src.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = border.index(y + k as i64 - radius, h);
                acc += weight * horizontal[sy * width as usize + x as usize];
            }
            output[(y * w + x) as usize] = acc;
        }
    }

    output
}

fn saturate(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Applies a square Gaussian blur to suppress sensor and scan noise.
///
/// # Arguments
///
/// * `image` - Single-channel input buffer
/// * `kernel_size` - Side of the square kernel, odd (5 for the extended profile)
///
/// # Errors
///
/// Returns `PreprocessingError` if the buffer is degenerate, not grayscale, or
/// the kernel size is even.
pub fn gaussian_blur(
    image: PixelBuffer,
    kernel_size: u32,
) -> Result<PixelBuffer, PreprocessingError> {
    const STAGE: &str = "gaussian_blur";

    if kernel_size == 0 || kernel_size % 2 == 0 {
        return Err(PreprocessingError::StageFailed {
            stage: STAGE.to_string(),
            message: format!("Invalid kernel size: {}. Must be odd", kernel_size),
        });
    }

    let gray = image.into_gray(STAGE)?;
    let (width, height) = gray.dimensions();
    let kernel = gaussian_kernel(kernel_size);
    let blurred: Vec<u8> = convolve_separable(&gray, &kernel, Border::Reflect101)
        .into_iter()
        .map(saturate)
        .collect();

    tracing::debug!(
        target: "ocr_preprocessing",
        "Gaussian blur completed: kernel={}x{}, dimensions={}x{}",
        kernel_size,
        kernel_size,
        width,
        height
    );

    PixelBuffer::new(width, height, 1, blurred)
}

/// Applies an affine `|gain * x + bias|` rescale, saturated to [0, 255].
///
/// On binarized input with a gain above 1 this keeps 0 and 255 fixed and
/// pushes any residual midtones toward white.
pub fn adjust_contrast(
    image: PixelBuffer,
    gain: f32,
    bias: f32,
) -> Result<PixelBuffer, PreprocessingError> {
    const STAGE: &str = "contrast";

    if !gain.is_finite() || !bias.is_finite() {
        return Err(PreprocessingError::StageFailed {
            stage: STAGE.to_string(),
            message: format!("Invalid contrast parameters: gain={}, bias={}", gain, bias),
        });
    }

    let gray = image.into_gray(STAGE)?;
    let (width, height) = gray.dimensions();

    // 256-entry lookup table, every input value maps the same way.
    let mut table = [0u8; 256];
    for (value, slot) in table.iter_mut().enumerate() {
        *slot = saturate((gain * value as f32 + bias).abs());
    }

    let adjusted: Vec<u8> = gray.as_raw().iter().map(|&v| table[v as usize]).collect();
    PixelBuffer::new(width, height, 1, adjusted)
}

/// Removes salt-and-pepper artifacts with a square median filter.
///
/// # Arguments
///
/// * `image` - Single-channel input buffer
/// * `kernel_size` - Side of the window, odd (3 for the extended profile)
pub fn median_denoise(
    image: PixelBuffer,
    kernel_size: u32,
) -> Result<PixelBuffer, PreprocessingError> {
    const STAGE: &str = "median_denoise";

    if kernel_size == 0 || kernel_size % 2 == 0 {
        return Err(PreprocessingError::StageFailed {
            stage: STAGE.to_string(),
            message: format!("Invalid kernel size: {}. Must be odd", kernel_size),
        });
    }

    let gray = image.into_gray(STAGE)?;
    let radius = kernel_size / 2;
    let filtered = imageproc::filter::median_filter(&gray, radius, radius);

    tracing::debug!(
        target: "ocr_preprocessing",
        "Median filter completed: kernel={}x{}, dimensions={}x{}",
        kernel_size,
        kernel_size,
        filtered.width(),
        filtered.height()
    );

    PixelBuffer::from_gray(filtered)
}

/// Restores edge contrast by convolving with a 3x3 sharpening kernel.
///
/// Borders are reflected (without repeating the edge pixel) and results are
/// saturated to [0, 255].
pub fn sharpen(image: PixelBuffer, kernel: &[i32; 9]) -> Result<PixelBuffer, PreprocessingError> {
    const STAGE: &str = "sharpen";

    let gray = image.into_gray(STAGE)?;
    let (width, height) = gray.dimensions();
    let (w, h) = (width as i64, height as i64);
    let src = gray.as_raw();

    let mut output = Vec::with_capacity(src.len());
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0i32;
            for ky in 0..3i64 {
                let sy = Border::Reflect101.index(y + ky - 1, h);
                for kx in 0..3i64 {
                    let sx = Border::Reflect101.index(x + kx - 1, w);
                    acc += kernel[(ky * 3 + kx) as usize] * src[sy * width as usize + sx] as i32;
                }
            }
            output.push(acc.clamp(0, 255) as u8);
        }
    }

    PixelBuffer::new(width, height, 1, output)
}

/// Types of morphological operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphologicalOperation {
    /// Erosion operation (shrinks bright regions)
    Erosion,
    /// Dilation operation (expands bright regions)
    Dilation,
    /// Opening operation (erosion followed by dilation - removes noise)
    Opening,
    /// Closing operation (dilation followed by erosion - fills gaps)
    Closing,
}

/// Applies a morphological operation with a rectangular structuring element.
///
/// Dilation takes the maximum of `src(p + o)` over the element offsets `o`,
/// so with the anchor at `(width / 2, height / 2)` a 2x2 element grows bright
/// regions toward +x and +y. Erosion takes the minimum of `src(p - o)`, the
/// reflected element, so closing never darkens a pixel and opening never
/// brightens one. Samples falling outside the image are ignored.
///
/// # Examples
///
/// ```
/// use scantext::preprocessing::{apply_morphological_operation, MorphologicalOperation};
/// use scantext::preprocessing::{PixelBuffer, StructuringElement};
///
/// let speck = PixelBuffer::new(3, 3, 1, vec![255, 255, 255, 255, 0, 255, 255, 255, 255]).unwrap();
/// let closed = apply_morphological_operation(
///     speck,
///     MorphologicalOperation::Closing,
///     StructuringElement::new(2, 2),
/// )
/// .unwrap();
/// assert!(closed.as_bytes().iter().all(|&v| v == 255));
/// ```
pub fn apply_morphological_operation(
    image: PixelBuffer,
    operation: MorphologicalOperation,
    element: StructuringElement,
) -> Result<PixelBuffer, PreprocessingError> {
    const STAGE: &str = "morphology";

    if element.width == 0 || element.height == 0 {
        return Err(PreprocessingError::StageFailed {
            stage: STAGE.to_string(),
            message: "Structuring element must not be empty".to_string(),
        });
    }

    let gray = image.into_gray(STAGE)?;
    let offsets = element.offsets();

    let processed = match operation {
        MorphologicalOperation::Erosion => apply_erosion(&gray, &offsets),
        MorphologicalOperation::Dilation => apply_dilation(&gray, &offsets),
        MorphologicalOperation::Opening => {
            let eroded = apply_erosion(&gray, &offsets);
            apply_dilation(&eroded, &offsets)
        }
        MorphologicalOperation::Closing => {
            let dilated = apply_dilation(&gray, &offsets);
            apply_erosion(&dilated, &offsets)
        }
    };

    tracing::debug!(
        target: "ocr_preprocessing",
        "Morphological operation completed: operation={:?}, element={}x{}, dimensions={}x{}",
        operation,
        element.width,
        element.height,
        processed.width(),
        processed.height()
    );

    PixelBuffer::from_gray(processed)
}

fn apply_erosion(image: &GrayImage, offsets: &[(i64, i64)]) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut min_val = 255u8;
        for &(dx, dy) in offsets {
            let nx = x as i64 - dx;
            let ny = y as i64 - dy;
            if nx >= 0 && ny >= 0 && nx < width as i64 && ny < height as i64 {
                min_val = min_val.min(image.get_pixel(nx as u32, ny as u32)[0]);
            }
        }
        image::Luma([min_val])
    })
}

fn apply_dilation(image: &GrayImage, offsets: &[(i64, i64)]) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut max_val = 0u8;
        for &(dx, dy) in offsets {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx >= 0 && ny >= 0 && nx < width as i64 && ny < height as i64 {
                max_val = max_val.max(image.get_pixel(nx as u32, ny as u32)[0]);
            }
        }
        image::Luma([max_val])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_buffer(width: u32, height: u32, data: Vec<u8>) -> PixelBuffer {
        PixelBuffer::new(width, height, 1, data).unwrap()
    }

    #[test]
    fn test_gaussian_kernel_sums_to_one() {
        for size in [1, 3, 5, 7, 11, 15] {
            let kernel = gaussian_kernel(size);
            assert_eq!(kernel.len(), size as usize);
            let sum: f32 = kernel.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "size {} sums to {}", size, sum);
        }
    }

    #[test]
    fn test_gaussian_kernel_is_symmetric() {
        let kernel = gaussian_kernel(11);
        for i in 0..kernel.len() / 2 {
            assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-7);
        }
    }

    #[test]
    fn test_border_indices() {
        assert_eq!(Border::Reflect101.index(-1, 5), 1);
        assert_eq!(Border::Reflect101.index(5, 5), 3);
        assert_eq!(Border::Reflect101.index(-6, 3), 2);
        assert_eq!(Border::Replicate.index(-3, 5), 0);
        assert_eq!(Border::Replicate.index(9, 5), 4);
        assert_eq!(Border::Reflect101.index(4, 1), 0);
    }

    #[test]
    fn test_gaussian_blur_uniform_image_unchanged() {
        let image = gray_buffer(8, 6, vec![137; 48]);
        let blurred = gaussian_blur(image.clone(), 5).unwrap();
        assert_eq!(blurred, image);
    }

    #[test]
    fn test_gaussian_blur_softens_edge() {
        let mut data = vec![0u8; 10 * 10];
        for y in 0..10 {
            for x in 5..10 {
                data[y * 10 + x] = 255;
            }
        }
        let blurred = gaussian_blur(gray_buffer(10, 10, data), 5).unwrap();
        let edge = blurred.as_bytes()[5 * 10 + 5];
        assert!(edge > 0 && edge < 255);
    }

    #[test]
    fn test_gaussian_blur_rejects_even_kernel() {
        let result = gaussian_blur(gray_buffer(4, 4, vec![0; 16]), 4);
        assert!(matches!(result, Err(PreprocessingError::StageFailed { .. })));
    }

    #[test]
    fn test_adjust_contrast_keeps_binary_values() {
        let image = gray_buffer(4, 1, vec![0, 255, 0, 255]);
        let adjusted = adjust_contrast(image, 1.5, 0.0).unwrap();
        assert_eq!(adjusted.as_bytes(), &[0, 255, 0, 255]);
    }

    #[test]
    fn test_adjust_contrast_saturates_midtones() {
        let image = gray_buffer(3, 1, vec![100, 180, 10]);
        let adjusted = adjust_contrast(image, 1.5, 0.0).unwrap();
        assert_eq!(adjusted.as_bytes(), &[150, 255, 15]);
    }

    #[test]
    fn test_median_removes_isolated_noise() {
        let mut data = vec![255u8; 25];
        data[12] = 0;
        let filtered = median_denoise(gray_buffer(5, 5, data), 3).unwrap();
        assert!(filtered.as_bytes().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_sharpen_uniform_image_unchanged() {
        let image = gray_buffer(5, 5, vec![90; 25]);
        let sharpened = sharpen(image.clone(), &[-1, -1, -1, -1, 9, -1, -1, -1, -1]).unwrap();
        assert_eq!(sharpened, image);
    }

    #[test]
    fn test_sharpen_boosts_center_pixel() {
        let mut data = vec![100u8; 9];
        data[4] = 120;
        let sharpened = sharpen(gray_buffer(3, 3, data), &[-1, -1, -1, -1, 9, -1, -1, -1, -1])
            .unwrap();
        // 9 * 120 - 8 * 100
        assert_eq!(sharpened.as_bytes()[4], 255);
    }

    #[test]
    fn test_dilation_expands_bright_pixel() {
        let mut data = vec![0u8; 25];
        data[2 * 5 + 2] = 255;
        let dilated = apply_morphological_operation(
            gray_buffer(5, 5, data),
            MorphologicalOperation::Dilation,
            StructuringElement::new(2, 2),
        )
        .unwrap();
        let bytes = dilated.as_bytes();
        // 2x2 element anchored at (1, 1) grows toward +x and +y
        assert_eq!(bytes[2 * 5 + 2], 255);
        assert_eq!(bytes[2 * 5 + 3], 255);
        assert_eq!(bytes[3 * 5 + 2], 255);
        assert_eq!(bytes[3 * 5 + 3], 255);
        assert_eq!(bytes[2 * 5 + 1], 0);
        assert_eq!(bytes[5 + 2], 0);
        assert_eq!(bytes.iter().filter(|&&v| v == 255).count(), 4);
    }

    #[test]
    fn test_erosion_keeps_top_left_of_block() {
        // Bright 2x2 block at (2..4, 2..4) erodes to its top-left pixel
        let mut data = vec![0u8; 25];
        for (x, y) in [(2, 2), (3, 2), (2, 3), (3, 3)] {
            data[y * 5 + x] = 255;
        }
        let eroded = apply_morphological_operation(
            gray_buffer(5, 5, data),
            MorphologicalOperation::Erosion,
            StructuringElement::new(2, 2),
        )
        .unwrap();
        let bytes = eroded.as_bytes();
        assert_eq!(bytes[2 * 5 + 2], 255);
        assert_eq!(bytes.iter().filter(|&&v| v == 255).count(), 1);
    }

    #[test]
    fn test_closing_never_darkens() {
        let data: Vec<u8> = (0..64).map(|i| if (i * 7) % 5 == 0 { 0 } else { 255 }).collect();
        let original = gray_buffer(8, 8, data);
        let closed = apply_morphological_operation(
            original.clone(),
            MorphologicalOperation::Closing,
            StructuringElement::new(2, 2),
        )
        .unwrap();
        for (before, after) in original.as_bytes().iter().zip(closed.as_bytes()) {
            assert!(after >= before);
        }
    }

    #[test]
    fn test_opening_removes_bright_speck() {
        let mut data = vec![0u8; 25];
        data[12] = 255;
        let opened = apply_morphological_operation(
            gray_buffer(5, 5, data),
            MorphologicalOperation::Opening,
            StructuringElement::new(2, 2),
        )
        .unwrap();
        assert!(opened.as_bytes().iter().all(|&v| v == 0));
    }
}
