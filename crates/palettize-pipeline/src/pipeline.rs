//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process_staged`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use palettize_pipeline::{Palette, Pipeline, PipelineConfig, PipelineError, RgbaImage};
//! # fn run(source: &RgbaImage, palette: Palette) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(source, palette, PipelineConfig::default())
//!     .pre_process()?
//!     .detect_edges()?
//!     .post_process()?
//!     .reduce()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying all previously computed intermediates. The source image is
//! copied once in [`Pipeline::new`]; the caller's buffer is never touched.

use crate::adjust::apply_pre_processing;
use crate::edge::{EdgeMap, detect_edges_with};
use crate::palette::Palette;
use crate::quantize::reduce_image;
use crate::rules::{EdgeCounts, apply_edge_post_processing};
use crate::types::{Dimensions, PipelineConfig, PipelineError, RgbaImage, StagedResult};
use crate::visualize::create_edge_visualization;

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`pre_process`](Self::pre_process) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .pre_process() to continue"]
pub struct Pending {
    config: PipelineConfig,
    palette: Palette,
    original: RgbaImage,
}

impl Pending {
    /// The untouched source image.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// Validate the configuration, then apply the global pre-processing
    /// pass to a working copy when one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if any part of the
    /// configuration is out of range.
    pub fn pre_process(self) -> Result<PreProcessed, PipelineError> {
        self.config.validate()?;

        let mut working = self.original.clone();
        let pre_processed = match &self.config.pre_process {
            Some(pre) => {
                apply_pre_processing(&mut working, pre)?;
                Some(working.clone())
            }
            None => None,
        };
        Ok(PreProcessed {
            config: self.config,
            palette: self.palette,
            original: self.original,
            pre_processed,
            working,
        })
    }
}

// ───────────────────────── Stage 1: PreProcessed ─────────────────────

/// Pipeline state after the optional global pre-processing pass.
///
/// Call [`detect_edges`](Self::detect_edges) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .detect_edges() to continue"]
pub struct PreProcessed {
    config: PipelineConfig,
    palette: Palette,
    original: RgbaImage,
    pre_processed: Option<RgbaImage>,
    working: RgbaImage,
}

impl PreProcessed {
    /// The pre-processed image, or `None` when the stage was disabled.
    #[must_use]
    pub const fn pre_processed(&self) -> Option<&RgbaImage> {
        self.pre_processed.as_ref()
    }

    /// Build the edge map (only when the algorithmic rule is enabled) and
    /// the rule visualization (whenever any rule is enabled).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for invalid detection
    /// parameters.
    pub fn detect_edges(self) -> Result<EdgesDetected, PipelineError> {
        let rules = &self.config.edge_rules;
        let edges = match &rules.algorithmic {
            Some(rule) => Some(detect_edges_with(&self.working, &rule.detection())?),
            None => None,
        };
        let edge_visualization = if rules.any_enabled() {
            Some(create_edge_visualization(
                &self.working,
                edges.as_ref(),
                rules,
            )?)
        } else {
            None
        };
        Ok(EdgesDetected {
            config: self.config,
            palette: self.palette,
            original: self.original,
            pre_processed: self.pre_processed,
            working: self.working,
            edges,
            edge_visualization,
        })
    }
}

// ───────────────────────── Stage 2: EdgesDetected ────────────────────

/// Pipeline state after edge detection and visualization.
///
/// Call [`post_process`](Self::post_process) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .post_process() to continue"]
pub struct EdgesDetected {
    config: PipelineConfig,
    palette: Palette,
    original: RgbaImage,
    pre_processed: Option<RgbaImage>,
    working: RgbaImage,
    edges: Option<EdgeMap>,
    edge_visualization: Option<RgbaImage>,
}

impl EdgesDetected {
    /// The edge magnitude map, if the algorithmic rule is enabled.
    #[must_use]
    pub const fn edges(&self) -> Option<&EdgeMap> {
        self.edges.as_ref()
    }

    /// The rule visualization, if any rule is enabled.
    #[must_use]
    pub const fn edge_visualization(&self) -> Option<&RgbaImage> {
        self.edge_visualization.as_ref()
    }

    /// Classification tallies for the working image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the edge map does
    /// not cover the working image.
    pub fn edge_counts(&self) -> Result<EdgeCounts, PipelineError> {
        self.config
            .edge_rules
            .count(&self.working, self.edges.as_ref())
    }

    /// Apply the edge adjustments to classified pixels.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for invalid rules or
    /// adjustments.
    pub fn post_process(mut self) -> Result<PostProcessed, PipelineError> {
        if self.config.edge_rules.any_enabled() {
            apply_edge_post_processing(
                &mut self.working,
                self.edges.as_ref(),
                &self.config.edge_rules,
                &self.config.edge_adjustments,
            )?;
        }
        Ok(PostProcessed {
            config: self.config,
            palette: self.palette,
            original: self.original,
            pre_processed: self.pre_processed,
            edges: self.edges,
            edge_visualization: self.edge_visualization,
            post_processed: self.working,
        })
    }
}

// ───────────────────────── Stage 3: PostProcessed ────────────────────

/// Pipeline state after edge post-processing.
///
/// Call [`reduce`](Self::reduce) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .reduce() to continue"]
pub struct PostProcessed {
    config: PipelineConfig,
    palette: Palette,
    original: RgbaImage,
    pre_processed: Option<RgbaImage>,
    edges: Option<EdgeMap>,
    edge_visualization: Option<RgbaImage>,
    post_processed: RgbaImage,
}

impl PostProcessed {
    /// The buffer that will be quantized.
    #[must_use]
    pub const fn post_processed(&self) -> &RgbaImage {
        &self.post_processed
    }

    /// Quantize the post-processed buffer against the palette.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyPalette`] when the palette has no
    /// opaque entry for a visible pixel.
    pub fn reduce(self) -> Result<Reduced, PipelineError> {
        let reduced = reduce_image(
            &self.post_processed,
            &self.palette,
            self.edges.as_ref(),
            &self.config.reduction,
        )?;
        Ok(Reduced {
            original: self.original,
            pre_processed: self.pre_processed,
            edges: self.edges,
            edge_visualization: self.edge_visualization,
            post_processed: self.post_processed,
            reduced,
        })
    }
}

// ───────────────────────── Stage 4: Reduced ──────────────────────────

/// Final pipeline state holding every intermediate.
#[must_use = "call .into_result() to take the staged output"]
pub struct Reduced {
    original: RgbaImage,
    pre_processed: Option<RgbaImage>,
    edges: Option<EdgeMap>,
    edge_visualization: Option<RgbaImage>,
    post_processed: RgbaImage,
    reduced: RgbaImage,
}

impl Reduced {
    /// The palette-reduced image.
    #[must_use]
    pub const fn reduced(&self) -> &RgbaImage {
        &self.reduced
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let dimensions = Dimensions::of(&self.reduced);
        StagedResult {
            original: self.original,
            pre_processed: self.pre_processed,
            edges: self.edges,
            edge_visualization: self.edge_visualization,
            post_processed: self.post_processed,
            reduced: self.reduced,
            dimensions,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental palette reduction pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline over a copy of `source`.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(source: &RgbaImage, palette: Palette, config: PipelineConfig) -> Pending {
        Pending {
            config,
            palette,
            original: source.clone(),
        }
    }
}
