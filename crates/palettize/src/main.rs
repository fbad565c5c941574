//! palettize: reduce an image to a fixed color palette.
//!
//! Reads a source image, builds a palette (extracted from a palette image
//! or generated from per-channel bit depths), runs the reduction pipeline
//! and writes the result as PNG or WebP. Optionally writes the edge rule
//! visualization, a swatch strip of the palette, and per-stage diagnostics.
//!
//! # Usage
//!
//! ```text
//! palettize [OPTIONS] --output <OUTPUT> <--palette <IMAGE>|--rgb-levels <RGB>> <SOURCE>
//! ```
//!
//! Log verbosity is controlled with `RUST_LOG` (default `palettize=info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{ArgGroup, Parser, ValueEnum};
use palettize_export::{ExportError, ImageFormat};
use palettize_pipeline::diagnostics::Clock;
use palettize_pipeline::{
    AdjustmentConfig, AlgorithmicRule, AlphaBand, DistanceMetric, DownsampleFilter, EdgeKernel,
    EdgeRuleConfig, HsvWeights, OutlineRule, Palette, PaletteOptions, PipelineConfig,
    PipelineError, PreProcessConfig, ReductionConfig, RgbaImage,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reduce an image to a fixed color palette with edge-aware adjustments.
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser)]
#[command(name = "palettize", version)]
#[command(group(ArgGroup::new("palette_source").required(true).args(["palette", "rgb_levels"])))]
struct Cli {
    /// Path to the source image (PNG, JPEG, BMP, WebP).
    source: PathBuf,

    /// Where to write the reduced image (.png or .webp).
    #[arg(short, long)]
    output: PathBuf,

    // ── Palette ──────────────────────────────────────────────────────
    /// Extract the palette from every distinct color of this image.
    #[arg(long)]
    palette: Option<PathBuf>,

    /// Generate an evenly spaced palette from per-channel bit depths,
    /// e.g. `232` or `343`.
    #[arg(long, value_parser = parse_rgb_levels)]
    rgb_levels: Option<(u8, u8, u8)>,

    /// Palette image pixels with alpha below this value are ignored.
    #[arg(long, default_value_t = PaletteOptions::DEFAULT_ALPHA_FLOOR)]
    palette_alpha_floor: u8,

    /// Maximum palette entries, transparent sentinel included.
    #[arg(long, default_value_t = PaletteOptions::DEFAULT_MAX_COLORS)]
    palette_max_colors: usize,

    // ── Downsampling ─────────────────────────────────────────────────
    /// Each output pixel covers a block this many source pixels wide.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    dot_width: u32,

    /// Downsample filter (none, nearest, triangle, catmull-rom, gaussian, lanczos3).
    #[arg(long, value_enum, default_value_t = Filter::Nearest)]
    filter: Filter,

    // ── Pre-processing ───────────────────────────────────────────────
    /// Red channel offset (-255..=255).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    red: i32,

    /// Green channel offset (-255..=255).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    green: i32,

    /// Blue channel offset (-255..=255).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    blue: i32,

    /// Global brightness offset (-255..=255).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    brightness: i32,

    /// Global contrast (-255..=255).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    contrast: i32,

    /// Global saturation change in percent (-100..=100).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    saturation: i32,

    /// Gamma exponent (> 0, 1.0 disables).
    #[arg(long, default_value_t = PreProcessConfig::DEFAULT_GAMMA)]
    gamma: f64,

    // ── Edge rules ───────────────────────────────────────────────────
    /// Treat partially transparent pixels as edges.
    #[arg(long)]
    alpha_band: bool,

    /// Lowest alpha (inclusive) counted by the alpha band rule.
    #[arg(long, default_value_t = AlphaBand::DEFAULT_MIN)]
    alpha_min: u8,

    /// Highest alpha (inclusive) counted by the alpha band rule.
    #[arg(long, default_value_t = AlphaBand::DEFAULT_MAX)]
    alpha_max: u8,

    /// Treat opaque pixels bordering transparency as edges.
    #[arg(long)]
    outline: bool,

    /// Minimum alpha for a pixel to be an outline candidate.
    #[arg(long, default_value_t = OutlineRule::DEFAULT_OPACITY_MIN)]
    outline_opacity_min: u8,

    /// Neighbors at or below this alpha count as transparent.
    #[arg(long, default_value_t = OutlineRule::DEFAULT_NEIGHBOR_MAX)]
    outline_neighbor_max: u8,

    /// Enable the gradient rule with this kernel (sobel, prewitt, scharr,
    /// roberts, laplacian, morphological).
    #[arg(long)]
    kernel: Option<EdgeKernel>,

    /// Gradient magnitude above which a pixel is an edge.
    #[arg(long, default_value_t = AlgorithmicRule::DEFAULT_THRESHOLD)]
    threshold: f32,

    /// Weight of hue versus luminance in the gradient (0..=100).
    #[arg(long, default_value_t = 0)]
    hue_priority: u8,

    // ── Edge adjustments ─────────────────────────────────────────────
    /// Brightness offset applied to edge pixels (-255..=255).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    edge_brightness: i32,

    /// Contrast applied to edge pixels (-255..=255).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    edge_contrast: i32,

    /// Saturation change for edge pixels in percent (-100..=100).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    edge_saturation: i32,

    /// Hue rotation for edge pixels in degrees (-180..=180).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    edge_hue: i32,

    // ── Reduction ────────────────────────────────────────────────────
    /// Color distance metric.
    #[arg(long, value_enum, default_value_t = Metric::Nearest)]
    metric: Metric,

    /// Hue weight for the weighted metric (0..=100).
    #[arg(long, default_value_t = HsvWeights::DEFAULT_H)]
    weight_h: u8,

    /// Saturation weight for the weighted metric (0..=100).
    #[arg(long, default_value_t = HsvWeights::DEFAULT_S)]
    weight_s: u8,

    /// Value weight for the weighted metric (0..=100).
    #[arg(long, default_value_t = HsvWeights::DEFAULT_V)]
    weight_v: u8,

    /// Brighten (+) or darken (-) strong edges before matching (-100..=100).
    /// Requires `--kernel`.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    edge_strength: f64,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    // ── Extra outputs ────────────────────────────────────────────────
    /// Write the edge rule visualization to this file.
    #[arg(long)]
    edges_output: Option<PathBuf>,

    /// Write a swatch strip of the palette to this file.
    #[arg(long)]
    palette_output: Option<PathBuf>,

    /// Print per-stage timing and count diagnostics to stdout.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of a human-readable report.
    #[arg(long, requires = "diagnostics")]
    json: bool,
}

/// Downsample resampling filter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Filter {
    /// Keep the source resolution.
    None,
    /// Nearest-neighbor (hard pixel edges).
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Gaussian (smooth).
    Gaussian,
    /// Lanczos with 3 lobes (sharpest).
    Lanczos3,
}

impl From<Filter> for DownsampleFilter {
    fn from(f: Filter) -> Self {
        match f {
            Filter::None => Self::None,
            Filter::Nearest => Self::Nearest,
            Filter::Triangle => Self::Triangle,
            Filter::CatmullRom => Self::CatmullRom,
            Filter::Gaussian => Self::Gaussian,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

/// Color distance metric selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Metric {
    /// Euclidean RGB.
    Nearest,
    /// Weighted HSV components (see `--weight-h/s/v`).
    Weighted,
    /// Euclidean CIELAB.
    Cielab,
    /// Luma-weighted RGB.
    Luma,
}

/// Errors surfaced to the user by the binary.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("error parsing --config-json: {0}")]
    ConfigJson(#[source] serde_json::Error),

    #[error("error reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error writing {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("error serializing diagnostics: {0}")]
    Diagnostics(#[source] serde_json::Error),
}

/// Parse a three-digit bit depth string such as `232`.
fn parse_rgb_levels(s: &str) -> Result<(u8, u8, u8), String> {
    let digits: Vec<u8> = s
        .trim()
        .chars()
        .map(|c| c.to_digit(10).and_then(|d| u8::try_from(d).ok()))
        .collect::<Option<_>>()
        .ok_or_else(|| format!("{s:?} is not a three-digit bit depth like 232"))?;
    match digits.as_slice() {
        &[r, g, b] if [r, g, b].iter().all(|bits| (1..=8).contains(bits)) => Ok((r, g, b)),
        _ => Err(format!(
            "{s:?} must be three digits between 1 and 8, e.g. 232"
        )),
    }
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, CliError> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(CliError::ConfigJson);
    }

    let pre = PreProcessConfig {
        red: cli.red,
        green: cli.green,
        blue: cli.blue,
        brightness: cli.brightness,
        contrast: cli.contrast,
        saturation: cli.saturation,
        gamma: cli.gamma,
    };

    Ok(PipelineConfig {
        pre_process: (pre != PreProcessConfig::default()).then_some(pre),
        edge_rules: EdgeRuleConfig {
            alpha_band: cli.alpha_band.then_some(AlphaBand {
                min: cli.alpha_min,
                max: cli.alpha_max,
            }),
            outline: cli.outline.then_some(OutlineRule {
                opacity_min: cli.outline_opacity_min,
                neighbor_max: cli.outline_neighbor_max,
            }),
            algorithmic: cli.kernel.map(|kernel| AlgorithmicRule {
                kernel,
                threshold: cli.threshold,
                hue_priority: cli.hue_priority,
                ..AlgorithmicRule::default()
            }),
        },
        edge_adjustments: AdjustmentConfig {
            brightness: cli.edge_brightness,
            contrast: cli.edge_contrast,
            saturation: cli.edge_saturation,
            hue: cli.edge_hue,
        },
        reduction: ReductionConfig {
            metric: match cli.metric {
                Metric::Nearest => DistanceMetric::Nearest,
                Metric::Weighted => DistanceMetric::Weighted(HsvWeights {
                    h: cli.weight_h,
                    s: cli.weight_s,
                    v: cli.weight_v,
                }),
                Metric::Cielab => DistanceMetric::Cielab,
                Metric::Luma => DistanceMetric::Luma,
            },
            edge_strength: cli.edge_strength,
        },
    })
}

/// Output format implied by a file extension, PNG when there is none.
fn format_for(path: &Path) -> Result<ImageFormat, ExportError> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(Ok(ImageFormat::Png), ImageFormat::from_extension)
}

fn read_image(path: &Path) -> Result<RgbaImage, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(palettize_pipeline::decode(&bytes)?)
}

fn write_image(path: &Path, image: &RgbaImage) -> Result<(), CliError> {
    let bytes = palettize_export::encode(image, format_for(path)?)?;
    std::fs::write(path, &bytes).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        bytes = bytes.len(),
        "image written"
    );
    Ok(())
}

fn load_palette(cli: &Cli) -> Result<Palette, CliError> {
    if let Some((r, g, b)) = cli.rgb_levels {
        return Ok(Palette::rgb_levels(r, g, b)?);
    }
    let Some(ref path) = cli.palette else {
        return Ok(Palette::new());
    };
    let image = read_image(path)?;
    let options = PaletteOptions {
        alpha_floor: cli.palette_alpha_floor,
        max_colors: cli.palette_max_colors,
    };
    let extraction = palettize_pipeline::extract_palette(&image, &options);
    if let Some(warning) = extraction.warning {
        tracing::warn!(path = %path.display(), "{warning}");
    }
    Ok(extraction.palette)
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = config_from_cli(cli)?;
    // Check any output format up front so a bad extension fails fast.
    for path in [Some(&cli.output), cli.edges_output.as_ref(), cli.palette_output.as_ref()]
        .into_iter()
        .flatten()
    {
        format_for(path)?;
    }

    let palette = load_palette(cli)?;
    tracing::info!(colors = palette.len().saturating_sub(1), "palette ready");

    let source = read_image(&cli.source)?;
    let (source, resized) = palettize_pipeline::downsample(&source, cli.dot_width, cli.filter.into());
    if resized {
        tracing::info!(
            dot_width = cli.dot_width,
            filter = %DownsampleFilter::from(cli.filter),
            width = source.width(),
            height = source.height(),
            "source downsampled"
        );
    }
    tracing::debug!(?config, "pipeline config");

    let staged = if cli.diagnostics {
        let (staged, diagnostics) = palettize_pipeline::diagnostics::process_staged_with_diagnostics(
            &source, &palette, &config, &StdClock,
        )?;
        if cli.json {
            let json = serde_json::to_string_pretty(&diagnostics).map_err(CliError::Diagnostics)?;
            println!("{json}");
        } else {
            println!("{}", diagnostics.report());
        }
        staged
    } else {
        palettize_pipeline::process_staged(&source, &palette, &config)?
    };

    write_image(&cli.output, &staged.reduced)?;

    if let Some(ref path) = cli.edges_output {
        match staged.edge_visualization {
            Some(ref vis) => write_image(path, vis)?,
            None => tracing::warn!(
                path = %path.display(),
                "no edge rule enabled, edge visualization not written"
            ),
        }
    }

    if let Some(ref path) = cli.palette_output {
        write_image(path, &palettize_export::palette_strip(&palette))?;
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "palettize=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
