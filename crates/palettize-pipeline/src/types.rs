//! Shared types for the palettize reduction pipeline.

use serde::{Deserialize, Serialize};

use crate::adjust::{AdjustmentConfig, PreProcessConfig};
use crate::quantize::ReductionConfig;
use crate::rules::EdgeRuleConfig;

/// Re-export `RgbaImage` so downstream crates can pass pixel buffers
/// around without depending on `image` directly.
///
/// Every pipeline stage consumes and produces 8-bit RGBA buffers with a
/// top-left origin in row-major order. The `image` crate guarantees
/// `data.len() == width * height * 4`.
pub use image::RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an RGBA buffer.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Configuration for a full reduction run.
///
/// Mirrors the controls of the interactive frontend: an optional global
/// pre-processing pass, the edge classification rules, the adjustments
/// applied to classified edge pixels, and the palette matching options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Global tone/color adjustment applied to every pixel before edge
    /// detection. `None` skips the stage.
    pub pre_process: Option<PreProcessConfig>,

    /// Which edge rules are enabled and their thresholds.
    pub edge_rules: EdgeRuleConfig,

    /// Adjustments applied only to pixels classified as edges.
    pub edge_adjustments: AdjustmentConfig,

    /// Palette matching options.
    pub reduction: ReductionConfig,
}

impl PipelineConfig {
    /// Check every section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// out-of-range parameter, or when an edge strength is set without the
    /// algorithmic rule that produces the edge map it reads.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if let Some(pre) = &self.pre_process {
            pre.validate()?;
        }
        self.edge_rules.validate()?;
        self.edge_adjustments.validate()?;
        self.reduction.validate()?;
        if self.reduction.edge_strength != 0.0 && self.edge_rules.algorithmic.is_none() {
            return Err(PipelineError::InvalidConfig(
                "edge strength requires the algorithmic edge rule (an edge kernel)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of running the full pipeline.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// The palette-reduced image.
    pub reduced: RgbaImage,

    /// Color-coded edge classification, present when any edge rule is
    /// enabled.
    pub edge_visualization: Option<RgbaImage>,

    /// Dimensions of the processed image in pixels.
    pub dimensions: Dimensions,
}

/// Result of running the pipeline with every intermediate preserved.
///
/// Used by comparison views that show the source next to each
/// processing step.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// The untouched source buffer (a copy; the caller keeps its own).
    pub original: RgbaImage,
    /// Output of the global pre-processing pass (`None` when disabled).
    pub pre_processed: Option<RgbaImage>,
    /// Edge magnitude map (`None` when the algorithmic rule is disabled).
    pub edges: Option<crate::edge::EdgeMap>,
    /// Edge rule visualization (`None` when no rule is enabled).
    pub edge_visualization: Option<RgbaImage>,
    /// Buffer after edge post-processing, right before quantization.
    pub post_processed: RgbaImage,
    /// The palette-reduced image.
    pub reduced: RgbaImage,
    /// Image dimensions in pixels.
    pub dimensions: Dimensions,
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The image could not be decoded.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input byte slice was empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A configuration value is outside its legal range.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The edge kernel name is not one of the supported algorithms.
    #[error("unknown edge kernel {0:?} (expected one of sobel, prewitt, scharr, roberts, laplacian, morphological)")]
    UnknownKernel(String),

    /// An edge map does not cover the pixel buffer it is applied to.
    #[error("edge map is {actual} but image is {expected}")]
    DimensionMismatch {
        /// Size of the pixel buffer.
        expected: Dimensions,
        /// Size of the edge map.
        actual: Dimensions,
    },

    /// The palette has no opaque color to match against.
    #[error("palette contains no opaque colors")]
    EmptyPalette,

    /// A palette edit was refused.
    #[error("cannot edit palette: {0}")]
    PaletteEdit(String),
}
