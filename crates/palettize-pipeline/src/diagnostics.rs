//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter experimentation. [`process_staged_with_diagnostics`] runs the
//! same stages as [`crate::process_staged`] and records each one.
//!
//! Timestamps come from a caller-supplied [`Clock`], so the crate never
//! touches a platform timer itself.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adjust::PreProcessConfig;
use crate::palette::Palette;
use crate::pipeline::Pipeline;
use crate::rules::EdgeCounts;
use crate::types::{Dimensions, PipelineConfig, PipelineError, RgbaImage, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
///
/// Stages that are conditionally skipped have `Option` fields that are
/// `None` when the stage was not executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Global pre-processing (only when configured).
    pub pre_process: Option<StageDiagnostics>,
    /// Edge map and rule visualization (only when any rule is enabled).
    pub edge_detection: Option<StageDiagnostics>,
    /// Edge post-processing.
    pub post_process: StageDiagnostics,
    /// Palette quantization.
    pub reduction: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Global pre-processing metrics.
    PreProcess {
        /// Pixels with non-zero alpha (the ones adjusted).
        visible_pixels: u64,
        /// Gamma exponent in effect.
        gamma: f64,
    },
    /// Edge classification metrics.
    EdgeDetection {
        /// Kernel name, when an edge map was built.
        kernel: Option<String>,
        /// Largest magnitude in the edge map (0 without a map).
        max_magnitude: f32,
        /// Per-category classification counts.
        counts: EdgeCounts,
    },
    /// Edge post-processing metrics.
    PostProcess {
        /// Pixels that received the edge adjustments.
        adjusted_pixels: u64,
    },
    /// Quantization metrics.
    Reduction {
        /// Distance metric name.
        metric: String,
        /// Opaque palette entries searched.
        palette_size: usize,
        /// Distinct colors in the output.
        colors_used: usize,
        /// Fully transparent output pixels.
        transparent_pixels: u64,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Image size.
    pub dimensions: Dimensions,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Palette entries including the sentinel.
    pub palette_len: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {} ({} pixels)  |  Palette: {} entries",
            self.summary.dimensions, self.summary.pixel_count, self.summary.palette_len,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages: Vec<(&str, &StageDiagnostics)> = Vec::new();
        if let Some(ref pre) = self.pre_process {
            stages.push(("Pre-process", pre));
        }
        if let Some(ref edges) = self.edge_detection {
            stages.push(("Edge Detection", edges));
        }
        stages.push(("Post-process", &self.post_process));
        stages.push(("Reduction", &self.reduction));

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_counts(counts: &EdgeCounts) -> String {
    format!(
        "structural={} algorithmic={} total={}",
        counts.structural, counts.algorithmic, counts.total
    )
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::PreProcess {
            visible_pixels,
            gamma,
        } => format!("{visible_pixels} visible px, gamma={gamma:.2}"),
        StageMetrics::EdgeDetection {
            kernel,
            max_magnitude,
            counts,
        } => match kernel {
            Some(kernel) => format!(
                "{kernel} max={max_magnitude:.1} {}",
                format_counts(counts)
            ),
            None => format_counts(counts),
        },
        StageMetrics::PostProcess {
            adjusted_pixels,
        } => format!("{adjusted_pixels} px adjusted"),
        StageMetrics::Reduction {
            metric,
            palette_size,
            colors_used,
            transparent_pixels,
        } => format!(
            "{metric} {colors_used}/{palette_size} colors used, {transparent_pixels} transparent px"
        ),
    }
}

fn visible_pixels(image: &RgbaImage) -> u64 {
    image.pixels().map(|p| u64::from(p.0[3] != 0)).sum()
}

/// Time one stage transition.
fn timed<C: Clock, T>(
    clock: &C,
    stage: impl FnOnce() -> Result<T, PipelineError>,
) -> Result<(T, Duration), PipelineError> {
    let start = clock.now();
    let value = stage()?;
    Ok((value, clock.elapsed(&start)))
}

/// Run the full pipeline, collecting per-stage diagnostics.
///
/// Produces the same [`StagedResult`] as [`crate::process_staged`].
///
/// # Errors
///
/// Returns [`PipelineError`] if any stage fails.
pub fn process_staged_with_diagnostics<C: Clock>(
    source: &RgbaImage,
    palette: &Palette,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let pipeline_start = clock.now();
    let dimensions = Dimensions::of(source);
    let pending = Pipeline::new(source, palette.clone(), config.clone());

    let (pre, pre_duration) = timed(clock, || pending.pre_process())?;
    let pre_process = pre.pre_processed().map(|img| StageDiagnostics {
        duration: pre_duration,
        metrics: StageMetrics::PreProcess {
            visible_pixels: visible_pixels(img),
            gamma: config
                .pre_process
                .map_or(PreProcessConfig::DEFAULT_GAMMA, |p| p.gamma),
        },
    });

    let (edges_stage, edge_duration) = timed(clock, || pre.detect_edges())?;
    let rules = &config.edge_rules;
    let counts = edges_stage.edge_counts()?;
    let edge_detection = rules.any_enabled().then(|| StageDiagnostics {
        duration: edge_duration,
        metrics: StageMetrics::EdgeDetection {
            kernel: rules.algorithmic.map(|rule| rule.kernel.to_string()),
            max_magnitude: edges_stage
                .edges()
                .map_or(0.0, |map| map.values().iter().copied().fold(0.0, f32::max)),
            counts,
        },
    });

    let (post, post_duration) = timed(clock, || edges_stage.post_process())?;
    let adjusted_pixels = if config.edge_adjustments.is_identity() {
        0
    } else {
        counts.total
    };
    let post_process = StageDiagnostics {
        duration: post_duration,
        metrics: StageMetrics::PostProcess { adjusted_pixels },
    };

    let (reduced, reduce_duration) = timed(clock, || post.reduce())?;
    let staged = reduced.into_result();
    let colors_used = staged
        .reduced
        .pixels()
        .filter(|p| p.0[3] != 0)
        .map(|p| p.0)
        .collect::<HashSet<_>>()
        .len();
    let reduction = StageDiagnostics {
        duration: reduce_duration,
        metrics: StageMetrics::Reduction {
            metric: config.reduction.metric.to_string(),
            palette_size: palette.opaque_colors().count(),
            colors_used,
            transparent_pixels: dimensions.pixel_count() - visible_pixels(&staged.reduced),
        },
    };

    let diagnostics = PipelineDiagnostics {
        pre_process,
        edge_detection,
        post_process,
        reduction,
        total_duration: clock.elapsed(&pipeline_start),
        summary: PipelineSummary {
            dimensions,
            pixel_count: dimensions.pixel_count(),
            palette_len: palette.len(),
        },
    };
    Ok((staged, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::adjust::AdjustmentConfig;
    use crate::palette::PaletteColor;
    use crate::rules::{AlgorithmicRule, EdgeRuleConfig};

    /// Every stage takes exactly one millisecond.
    struct TickClock;

    impl Clock for TickClock {
        type Instant = ();

        fn now(&self) -> Self::Instant {}

        fn elapsed(&self, _since: &Self::Instant) -> Duration {
            Duration::from_millis(1)
        }
    }

    fn source() -> RgbaImage {
        RgbaImage::from_fn(6, 6, |x, y| {
            if y == 0 {
                Rgba([0, 0, 0, 0])
            } else if x < 3 {
                Rgba([10, 10, 10, 255])
            } else {
                Rgba([240, 240, 240, 255])
            }
        })
    }

    fn palette() -> Palette {
        Palette::from_colors([
            PaletteColor::opaque(0, 0, 0),
            PaletteColor::opaque(255, 255, 255),
            PaletteColor::opaque(255, 0, 0),
        ])
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn default_config_skips_optional_stages() {
        let (staged, diag) =
            process_staged_with_diagnostics(&source(), &palette(), &PipelineConfig::default(), &TickClock)
                .unwrap();
        assert!(diag.pre_process.is_none());
        assert!(diag.edge_detection.is_none());
        assert_eq!(diag.summary.pixel_count, 36);
        assert_eq!(diag.summary.palette_len, 4);
        match diag.reduction.metrics {
            StageMetrics::Reduction {
                ref metric,
                palette_size,
                colors_used,
                transparent_pixels,
            } => {
                assert_eq!(metric, "nearest");
                assert_eq!(palette_size, 3);
                assert_eq!(colors_used, 2);
                assert_eq!(transparent_pixels, 6);
            }
            ref other => panic!("unexpected metrics {other:?}"),
        }
        assert_eq!(staged.reduced.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn edge_stage_reports_counts() {
        let config = PipelineConfig {
            edge_rules: EdgeRuleConfig {
                algorithmic: Some(AlgorithmicRule::default()),
                ..EdgeRuleConfig::default()
            },
            edge_adjustments: AdjustmentConfig {
                brightness: -50,
                ..AdjustmentConfig::default()
            },
            ..PipelineConfig::default()
        };
        let (_, diag) =
            process_staged_with_diagnostics(&source(), &palette(), &config, &TickClock).unwrap();
        let edges = diag.edge_detection.unwrap();
        let StageMetrics::EdgeDetection {
            kernel,
            max_magnitude,
            counts,
        } = edges.metrics
        else {
            panic!("unexpected metrics");
        };
        assert_eq!(kernel.as_deref(), Some("sobel"));
        assert!(max_magnitude > AlgorithmicRule::DEFAULT_THRESHOLD);
        assert!(counts.algorithmic > 0);
        assert_eq!(counts.structural, 0);
        match diag.post_process.metrics {
            StageMetrics::PostProcess { adjusted_pixels } => {
                assert_eq!(adjusted_pixels, counts.total);
            }
            ref other => panic!("unexpected metrics {other:?}"),
        }
    }

    #[test]
    fn report_lists_executed_stages() {
        let (_, diag) =
            process_staged_with_diagnostics(&source(), &palette(), &PipelineConfig::default(), &TickClock)
                .unwrap();
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Image: 6x6 (36 pixels)"));
        assert!(report.contains("Post-process"));
        assert!(report.contains("Reduction"));
        assert!(!report.contains("Edge Detection"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let (_, diag) =
            process_staged_with_diagnostics(&source(), &palette(), &PipelineConfig::default(), &TickClock)
                .unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 0.001).abs() < 1e-12);
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.total_duration, Duration::from_millis(1));
    }
}
