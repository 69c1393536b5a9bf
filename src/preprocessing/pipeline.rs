//! # Preprocessing Pipeline
//!
//! An ordered list of stages applied to a [`PixelBuffer`] under one immutable
//! [`StageConfig`]. The minimal and extended recipes are both plain stage
//! lists, so callers can also assemble their own.

use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing;

use super::filtering::{
    adjust_contrast, apply_morphological_operation, gaussian_blur, median_denoise, sharpen,
    MorphologicalOperation,
};
use super::grayscale::to_grayscale;
use super::scaling::ImageScaler;
use super::thresholding::apply_adaptive_threshold;
use super::types::{PixelBuffer, PreprocessingError, StageConfig, StageReport};

/// One preprocessing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Color to single-channel luminance
    Grayscale,
    /// Enlarge narrow images to the minimum working width
    Upscale,
    /// Gaussian smoothing
    GaussianBlur,
    /// Local-mean binarization
    AdaptiveThreshold,
    /// Affine contrast rescale
    Contrast,
    /// Dilation then erosion to fuse broken strokes
    Closing,
    /// Median filter against salt-and-pepper noise
    MedianDenoise,
    /// 3x3 edge sharpening
    Sharpen,
    /// Second dilate/erode pass after sharpening
    Reconnect,
}

impl Stage {
    /// Stages of the minimal recipe, for clean input.
    pub const MINIMAL: [Stage; 3] = [Stage::Grayscale, Stage::Upscale, Stage::AdaptiveThreshold];

    /// Stages of the extended recipe, for noisy low-quality scans.
    pub const EXTENDED: [Stage; 9] = [
        Stage::Grayscale,
        Stage::Upscale,
        Stage::GaussianBlur,
        Stage::AdaptiveThreshold,
        Stage::Contrast,
        Stage::Closing,
        Stage::MedianDenoise,
        Stage::Sharpen,
        Stage::Reconnect,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Grayscale => "grayscale",
            Stage::Upscale => "upscale",
            Stage::GaussianBlur => "gaussian_blur",
            Stage::AdaptiveThreshold => "adaptive_threshold",
            Stage::Contrast => "contrast",
            Stage::Closing => "closing",
            Stage::MedianDenoise => "median_denoise",
            Stage::Sharpen => "sharpen",
            Stage::Reconnect => "reconnect",
        }
    }

    /// Runs this stage on `image` with the constants from `config`.
    ///
    /// Errors are attributed to this stage's name.
    pub fn apply(
        &self,
        image: PixelBuffer,
        config: &StageConfig,
    ) -> Result<PixelBuffer, PreprocessingError> {
        let result = match self {
            Stage::Grayscale => to_grayscale(image),
            Stage::Upscale => {
                ImageScaler::with_limits(config.min_width, config.max_output_pixels)?.scale(image)
            }
            Stage::GaussianBlur => gaussian_blur(image, config.blur_kernel),
            Stage::AdaptiveThreshold => apply_adaptive_threshold(
                image,
                config.threshold_block_size,
                config.threshold_offset,
            ),
            Stage::Contrast => adjust_contrast(image, config.contrast_gain, config.contrast_bias),
            Stage::Closing => apply_morphological_operation(
                image,
                MorphologicalOperation::Closing,
                config.closing_element,
            ),
            Stage::MedianDenoise => median_denoise(image, config.median_kernel),
            Stage::Sharpen => sharpen(image, &config.sharpen_kernel),
            Stage::Reconnect => apply_morphological_operation(
                image,
                MorphologicalOperation::Closing,
                config.reconnect_element,
            ),
        };
        result.map_err(|e| e.at_stage(self.name()))
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = PreprocessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Stage::EXTENDED
            .iter()
            .copied()
            .find(|stage| stage.name() == normalized)
            .ok_or_else(|| PreprocessingError::InvalidConfig {
                message: format!("Unknown preprocessing stage: '{}'", s.trim()),
            })
    }
}

/// Named stage recipes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineProfile {
    /// Grayscale, upscale, adaptive threshold
    Minimal,
    /// All nine stages
    Extended,
    /// Caller-supplied stage order
    Custom(Vec<Stage>),
}

impl PipelineProfile {
    pub fn stages(&self) -> Vec<Stage> {
        match self {
            PipelineProfile::Minimal => Stage::MINIMAL.to_vec(),
            PipelineProfile::Extended => Stage::EXTENDED.to_vec(),
            PipelineProfile::Custom(stages) => stages.clone(),
        }
    }

    /// Parses a comma-separated stage list such as `grayscale,upscale,adaptive_threshold`.
    pub fn parse_stage_list(list: &str) -> Result<Self, PreprocessingError> {
        let stages = list
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Stage::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PipelineProfile::Custom(stages))
    }
}

impl Default for PipelineProfile {
    fn default() -> Self {
        PipelineProfile::Minimal
    }
}

impl FromStr for PipelineProfile {
    type Err = PreprocessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(PipelineProfile::Minimal),
            "extended" => Ok(PipelineProfile::Extended),
            other => Err(PreprocessingError::InvalidConfig {
                message: format!(
                    "Unknown pipeline profile: '{}'. Expected 'minimal' or 'extended'",
                    other
                ),
            }),
        }
    }
}

/// Deterministic preprocessing pipeline.
///
/// # Examples
///
/// ```
/// use scantext::preprocessing::{PixelBuffer, PreprocessingPipeline};
///
/// let scan = PixelBuffer::new(40, 20, 3, vec![180; 40 * 20 * 3]).unwrap();
/// let binary = PreprocessingPipeline::minimal().run(scan).unwrap();
///
/// assert_eq!(binary.dimensions(), (1000, 500));
/// assert!(binary.is_binary());
/// ```
#[derive(Debug, Clone)]
pub struct PreprocessingPipeline {
    stages: Vec<Stage>,
    config: StageConfig,
}

impl PreprocessingPipeline {
    /// Builds a pipeline from a profile and stage constants.
    ///
    /// # Errors
    ///
    /// Returns `PreprocessingError::InvalidConfig` if the constants are out of
    /// range, the stage list is empty, or it does not begin with grayscale
    /// conversion.
    pub fn new(profile: PipelineProfile, config: StageConfig) -> Result<Self, PreprocessingError> {
        Self::with_stages(profile.stages(), config)
    }

    /// Builds a pipeline from an explicit stage list.
    pub fn with_stages(
        stages: Vec<Stage>,
        config: StageConfig,
    ) -> Result<Self, PreprocessingError> {
        config.validate()?;

        match stages.first() {
            None => {
                return Err(PreprocessingError::InvalidConfig {
                    message: "pipeline needs at least one stage".to_string(),
                })
            }
            Some(Stage::Grayscale) => {}
            Some(first) => {
                return Err(PreprocessingError::InvalidConfig {
                    message: format!("pipeline must start with grayscale, not {}", first),
                })
            }
        }

        Ok(Self { stages, config })
    }

    /// The three-stage recipe with default constants.
    pub fn minimal() -> Self {
        Self {
            stages: Stage::MINIMAL.to_vec(),
            config: StageConfig::default(),
        }
    }

    /// The nine-stage recipe with default constants.
    pub fn extended() -> Self {
        Self {
            stages: Stage::EXTENDED.to_vec(),
            config: StageConfig::default(),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Runs every stage in order and returns the final buffer.
    ///
    /// # Errors
    ///
    /// Fails with the first stage error; no partially processed buffer is
    /// returned.
    pub fn run(&self, input: PixelBuffer) -> Result<PixelBuffer, PreprocessingError> {
        self.run_with_report(input).map(|(output, _)| output)
    }

    /// Runs every stage and records the output shape and time of each.
    pub fn run_with_report(
        &self,
        input: PixelBuffer,
    ) -> Result<(PixelBuffer, Vec<StageReport>), PreprocessingError> {
        input.ensure_valid("input")?;

        let total_start = Instant::now();
        let mut reports = Vec::with_capacity(self.stages.len());
        let mut buffer = input;

        for stage in &self.stages {
            let start = Instant::now();
            buffer = stage.apply(buffer, &self.config)?;
            buffer.ensure_valid(stage.name())?;
            let elapsed = start.elapsed();

            crate::observability::record_stage_duration(stage.name(), elapsed);

            reports.push(StageReport {
                stage: stage.name(),
                dimensions: buffer.dimensions(),
                channels: buffer.channels(),
                processing_time_ms: elapsed.as_millis() as u32,
            });
        }

        tracing::debug!(
            target: "ocr_preprocessing",
            "Pipeline completed in {}ms: stages={}, output={}x{}",
            total_start.elapsed().as_millis(),
            self.stages.len(),
            buffer.width(),
            buffer.height()
        );

        Ok((buffer, reports))
    }
}

impl Default for PreprocessingPipeline {
    fn default() -> Self {
        Self::minimal()
    }
}
