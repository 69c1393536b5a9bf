//! # Color Normalization
//!
//! Converts decoded color buffers to a single luminance channel.

use tracing;

use super::types::{PixelBuffer, PreprocessingError};

/// Converts a buffer to single-channel grayscale using BT.601 luma weights.
///
/// Each output pixel is `(299 R + 587 G + 114 B + 500) / 1000`, computed in
/// integer arithmetic so the result is exact and platform independent.
/// Single-channel input is returned unchanged.
///
/// # Errors
///
/// Returns `PreprocessingError::EmptyImage` for degenerate buffers and
/// `InvalidChannels` for anything other than 1 or 3 channels.
pub fn to_grayscale(image: PixelBuffer) -> Result<PixelBuffer, PreprocessingError> {
    const STAGE: &str = "grayscale";
    image.ensure_valid(STAGE)?;

    match image.channels() {
        1 => Ok(image),
        3 => {
            let (width, height) = image.dimensions();
            let luma: Vec<u8> = image
                .as_bytes()
                .chunks_exact(3)
                .map(|rgb| {
                    let weighted =
                        299 * rgb[0] as u32 + 587 * rgb[1] as u32 + 114 * rgb[2] as u32;
                    ((weighted + 500) / 1000) as u8
                })
                .collect();

            tracing::debug!(
                target: "ocr_preprocessing",
                "Grayscale conversion completed: dimensions={}x{}",
                width,
                height
            );

            PixelBuffer::new(width, height, 1, luma)
        }
        channels => Err(PreprocessingError::InvalidChannels {
            stage: STAGE.to_string(),
            channels,
        }),
    }
}
