//! palettize-pipeline: Pure palette reduction pipeline (sans-IO).
//!
//! Maps a full-color RGBA image onto a fixed palette, optionally
//! emphasizing edges along the way:
//! pre-processing -> edge detection -> edge post-processing ->
//! nearest-color quantization.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! buffers and returns structured data. File access and encoding live in
//! the `palettize` binary and `palettize-export`.

pub mod adjust;
pub mod color;
pub mod decode;
pub mod diagnostics;
pub mod downsample;
pub mod edge;
pub mod palette;
pub mod pipeline;
pub mod quantize;
pub mod rules;
pub mod types;
pub mod visualize;

pub use adjust::{AdjustmentConfig, PreProcessConfig, apply_pre_processing};
pub use decode::decode;
pub use downsample::{DownsampleFilter, downsample};
pub use edge::{EdgeDetection, EdgeKernel, EdgeMap, detect_edges, detect_edges_with};
pub use palette::{
    Palette, PaletteColor, PaletteExtraction, PaletteOptions, PaletteWarning, extract_palette,
};
pub use pipeline::Pipeline;
pub use quantize::{DistanceMetric, HsvWeights, ReductionConfig, reduce_image};
pub use rules::{AlgorithmicRule, AlphaBand, EdgeRuleConfig, OutlineRule, apply_edge_post_processing};
pub use types::{
    Dimensions, PipelineConfig, PipelineError, ProcessResult, RgbaImage, StagedResult,
};
pub use visualize::create_edge_visualization;

/// Run the full reduction pipeline.
///
/// The source buffer is copied; it is never modified.
///
/// # Pipeline steps
///
/// 1. Optional global pre-processing
/// 2. Edge map, when the algorithmic rule is enabled
/// 3. Rule visualization, when any edge rule is enabled
/// 4. Edge post-processing of classified pixels
/// 5. Nearest-color quantization against `palette`
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for out-of-range settings and
/// [`PipelineError::EmptyPalette`] if the palette has no opaque color.
pub fn process(
    source: &RgbaImage,
    palette: &Palette,
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    let staged = process_staged(source, palette, config)?;
    Ok(ProcessResult {
        reduced: staged.reduced,
        edge_visualization: staged.edge_visualization,
        dimensions: staged.dimensions,
    })
}

/// Run the full pipeline, keeping every intermediate buffer.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    source: &RgbaImage,
    palette: &Palette,
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(source, palette.clone(), config.clone())
        .pre_process()?
        .detect_edges()?
        .post_process()?
        .reduce()?
        .into_result())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    /// Opaque image with a transparent border, a red block and a blue block.
    fn sprite() -> RgbaImage {
        RgbaImage::from_fn(10, 10, |x, y| {
            if x == 0 || y == 0 || x == 9 || y == 9 {
                Rgba([0, 0, 0, 0])
            } else if x < 5 {
                Rgba([200, 30, 30, 255])
            } else {
                Rgba([30, 30, 200, 255])
            }
        })
    }

    fn primaries() -> Palette {
        Palette::from_colors([
            PaletteColor::opaque(255, 0, 0),
            PaletteColor::opaque(0, 0, 255),
            PaletteColor::opaque(0, 0, 0),
        ])
    }

    #[test]
    fn process_preserves_transparency_and_maps_colors() {
        let source = sprite();
        let result = process(&source, &primaries(), &PipelineConfig::default()).unwrap();
        assert_eq!(result.dimensions, Dimensions::of(&source));
        assert!(result.edge_visualization.is_none());
        assert_eq!(result.reduced.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(result.reduced.get_pixel(2, 5).0, [255, 0, 0, 255]);
        assert_eq!(result.reduced.get_pixel(7, 5).0, [0, 0, 255, 255]);
    }

    #[test]
    fn process_leaves_source_untouched() {
        let source = sprite();
        let copy = source.clone();
        let config = PipelineConfig {
            pre_process: Some(PreProcessConfig {
                contrast: 80,
                ..PreProcessConfig::default()
            }),
            edge_rules: EdgeRuleConfig {
                outline: Some(OutlineRule::default()),
                ..EdgeRuleConfig::default()
            },
            edge_adjustments: AdjustmentConfig {
                brightness: -255,
                ..AdjustmentConfig::default()
            },
            ..PipelineConfig::default()
        };
        let _ = process(&source, &primaries(), &config).unwrap();
        assert_eq!(source, copy);
    }

    #[test]
    fn outline_darkening_maps_border_to_black() {
        let config = PipelineConfig {
            edge_rules: EdgeRuleConfig {
                outline: Some(OutlineRule::default()),
                ..EdgeRuleConfig::default()
            },
            edge_adjustments: AdjustmentConfig {
                brightness: -255,
                ..AdjustmentConfig::default()
            },
            ..PipelineConfig::default()
        };
        let result = process(&sprite(), &primaries(), &config).unwrap();
        // (1, 5) touches the transparent border; (3, 5) does not.
        assert_eq!(result.reduced.get_pixel(1, 5).0, [0, 0, 0, 255]);
        assert_eq!(result.reduced.get_pixel(3, 5).0, [255, 0, 0, 255]);
        let vis = result.edge_visualization.unwrap();
        assert_eq!(vis.get_pixel(1, 5).0, [0, 0, 255, 255]);
        assert_eq!(vis.get_pixel(3, 5).0, [0, 0, 0, 255]);
    }

    #[test]
    fn extracted_palette_reproduces_source() {
        let source = sprite();
        let extraction = extract_palette(&source, &PaletteOptions::default());
        assert!(extraction.warning.is_none());
        assert_eq!(extraction.palette.len(), 3);
        let result = process(&source, &extraction.palette, &PipelineConfig::default()).unwrap();
        for (x, y, p) in source.enumerate_pixels() {
            let out = result.reduced.get_pixel(x, y).0;
            if p.0[3] == 0 {
                assert_eq!(out, [0, 0, 0, 0]);
            } else {
                assert_eq!(out, p.0);
            }
        }
    }

    #[test]
    fn staged_keeps_intermediates() {
        let config = PipelineConfig {
            pre_process: Some(PreProcessConfig {
                brightness: 5,
                ..PreProcessConfig::default()
            }),
            edge_rules: EdgeRuleConfig {
                algorithmic: Some(AlgorithmicRule::default()),
                ..EdgeRuleConfig::default()
            },
            ..PipelineConfig::default()
        };
        let staged = process_staged(&sprite(), &primaries(), &config).unwrap();
        assert_eq!(staged.pre_processed.unwrap().get_pixel(2, 5).0, [205, 35, 35, 255]);
        assert!(staged.edges.is_some());
        assert!(staged.edge_visualization.is_some());
        // Identity adjustments leave the pre-processed buffer as is.
        assert_eq!(staged.post_processed.get_pixel(2, 5).0, [205, 35, 35, 255]);
    }

    #[test]
    fn invalid_gamma_is_rejected() {
        let config = PipelineConfig {
            pre_process: Some(PreProcessConfig {
                gamma: -1.0,
                ..PreProcessConfig::default()
            }),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            process(&sprite(), &primaries(), &config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }
}
