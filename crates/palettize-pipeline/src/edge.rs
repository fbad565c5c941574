//! Edge magnitude detection.
//!
//! Produces an [`EdgeMap`]: one `f32` magnitude per pixel, nominally
//! normalized to 0-255. Each algorithm computes a luma gradient and,
//! when `hue_weight > 0`, a gradient of the hue direction expressed as a
//! scaled `(sin, cos)` vector. The two are blended as
//! `luma * (1 - hue_weight) + hue * hue_weight`.
//!
//! Samples outside the image read as black with a zero hue vector.
//! Pixels whose own alpha is below [`MIN_SOURCE_ALPHA`] are left at zero
//! so fully transparent regions never register as edges.
//!
//! The combined magnitude is not clamped; strong hue gradients can push
//! a pixel slightly above 255.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::{DEFAULT_HUE_RADIUS, hue_unit_vector, luma};
use crate::types::{Dimensions, PipelineError, RgbaImage};

/// Pixels with alpha below this value are not evaluated.
pub const MIN_SOURCE_ALPHA: u8 = 10;

/// `sqrt(2)` to four decimals, as used by the normalization divisors.
const SQRT2_APPROX: f64 = 1.4142;

/// Edge detection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKernel {
    /// 3x3 Sobel operator.
    #[default]
    Sobel,
    /// 3x3 Prewitt operator.
    Prewitt,
    /// 3x3 Scharr operator.
    Scharr,
    /// 2x2 Roberts cross.
    Roberts,
    /// 4-neighbor discrete Laplacian.
    Laplacian,
    /// Morphological gradient (3x3 dilation minus erosion).
    Morphological,
}

impl EdgeKernel {
    /// Every supported kernel, in menu order.
    pub const ALL: [Self; 6] = [
        Self::Sobel,
        Self::Prewitt,
        Self::Scharr,
        Self::Roberts,
        Self::Laplacian,
        Self::Morphological,
    ];

    /// Lowercase name used in configuration files and the CLI.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sobel => "sobel",
            Self::Prewitt => "prewitt",
            Self::Scharr => "scharr",
            Self::Roberts => "roberts",
            Self::Laplacian => "laplacian",
            Self::Morphological => "morphological",
        }
    }

    /// Horizontal/vertical 3x3 kernels and the normalization divisor for
    /// the directional operators.
    const fn directional(self) -> Option<([[f64; 3]; 3], [[f64; 3]; 3], f64)> {
        match self {
            Self::Sobel => Some((
                [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]],
                [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]],
                4.0 * SQRT2_APPROX,
            )),
            Self::Prewitt => Some((
                [[-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0]],
                [[-1.0, -1.0, -1.0], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
                3.0 * SQRT2_APPROX,
            )),
            Self::Scharr => Some((
                [[-3.0, 0.0, 3.0], [-10.0, 0.0, 10.0], [-3.0, 0.0, 3.0]],
                [[-3.0, -10.0, -3.0], [0.0, 0.0, 0.0], [3.0, 10.0, 3.0]],
                16.0 * SQRT2_APPROX,
            )),
            Self::Roberts | Self::Laplacian | Self::Morphological => None,
        }
    }
}

impl fmt::Display for EdgeKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EdgeKernel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PipelineError::UnknownKernel(s.to_string()))
    }
}

/// A per-pixel edge magnitude field.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl EdgeMap {
    /// An all-zero map.
    #[must_use]
    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width as usize * height as usize],
        }
    }

    /// Wrap precomputed magnitudes.
    ///
    /// Returns `None` if `values.len() != width * height`.
    #[must_use]
    pub fn from_raw(width: u32, height: u32, values: Vec<f32>) -> Option<Self> {
        (values.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            values,
        })
    }

    /// Map width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Map height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Map size.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Magnitudes in row-major order.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Magnitude at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    /// Number of magnitudes strictly above `threshold`.
    #[must_use]
    pub fn count_above(&self, threshold: f32) -> u64 {
        self.values.iter().map(|&v| u64::from(v > threshold)).sum()
    }

    /// Check that this map covers `image` exactly.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] otherwise.
    pub fn ensure_matches(&self, image: &RgbaImage) -> Result<(), PipelineError> {
        let expected = Dimensions::of(image);
        if self.dimensions() == expected {
            Ok(())
        } else {
            Err(PipelineError::DimensionMismatch {
                expected,
                actual: self.dimensions(),
            })
        }
    }
}

/// Edge detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeDetection {
    /// Which operator to apply.
    pub kernel: EdgeKernel,
    /// Share of the hue gradient in the final magnitude, `0.0..=1.0`.
    pub hue_weight: f64,
    /// Radius the hue vector is scaled to before differentiation.
    pub hue_radius: f64,
}

impl Default for EdgeDetection {
    fn default() -> Self {
        Self {
            kernel: EdgeKernel::default(),
            hue_weight: 0.0,
            hue_radius: DEFAULT_HUE_RADIUS,
        }
    }
}

impl EdgeDetection {
    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `hue_weight` is outside
    /// `0.0..=1.0` or `hue_radius` is not a finite positive number.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(0.0..=1.0).contains(&self.hue_weight) {
            return Err(PipelineError::InvalidConfig(format!(
                "hue weight must be within 0..=1, got {}",
                self.hue_weight
            )));
        }
        if !(self.hue_radius.is_finite() && self.hue_radius > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "hue radius must be positive, got {}",
                self.hue_radius
            )));
        }
        Ok(())
    }
}

/// Luma and scaled hue vector of one pixel.
#[derive(Debug, Clone, Copy, Default)]
struct Sample {
    luma: f64,
    sin: f64,
    cos: f64,
}

/// Per-pixel samples computed once up front, with zero fill outside the
/// image bounds.
struct SampleGrid {
    width: i64,
    height: i64,
    samples: Vec<Sample>,
}

impl SampleGrid {
    fn new(image: &RgbaImage, with_hue: bool, hue_radius: f64) -> Self {
        let samples = image
            .pixels()
            .map(|p| {
                let [r, g, b, _] = p.0;
                let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
                let (sin, cos) = if with_hue {
                    hue_unit_vector(r, g, b, hue_radius)
                } else {
                    (0.0, 0.0)
                };
                Sample {
                    luma: luma(r, g, b),
                    sin,
                    cos,
                }
            })
            .collect();
        Self {
            width: i64::from(image.width()),
            height: i64::from(image.height()),
            samples,
        }
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn at(&self, x: i64, y: i64) -> Sample {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return Sample::default();
        }
        self.samples[(y * self.width + x) as usize]
    }
}

/// Detect edges with `kernel`, blending in `hue_weight` of the hue
/// gradient.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `hue_weight` is outside
/// `0.0..=1.0`.
pub fn detect_edges(
    image: &RgbaImage,
    kernel: EdgeKernel,
    hue_weight: f64,
) -> Result<EdgeMap, PipelineError> {
    detect_edges_with(
        image,
        &EdgeDetection {
            kernel,
            hue_weight,
            ..EdgeDetection::default()
        },
    )
}

/// Detect edges with full control over the detection parameters.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the parameters fail
/// [`EdgeDetection::validate`].
pub fn detect_edges_with(
    image: &RgbaImage,
    params: &EdgeDetection,
) -> Result<EdgeMap, PipelineError> {
    params.validate()?;

    let with_hue = params.hue_weight > 0.0;
    let grid = SampleGrid::new(image, with_hue, params.hue_radius);
    let luma_weight = 1.0 - params.hue_weight;
    let hue_weight = params.hue_weight;

    let mut map = EdgeMap::zeros(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel.0[3] < MIN_SOURCE_ALPHA {
            continue;
        }
        let (xi, yi) = (i64::from(x), i64::from(y));
        let (mag_luma, mag_hue) = match params.kernel.directional() {
            Some((kx, ky, divisor)) => directional(&grid, xi, yi, &kx, &ky, divisor, with_hue),
            None => match params.kernel {
                EdgeKernel::Roberts => roberts(&grid, xi, yi, with_hue),
                EdgeKernel::Laplacian => laplacian(&grid, xi, yi, with_hue),
                _ => morphological(&grid, xi, yi, with_hue),
            },
        };
        let idx = y as usize * image.width() as usize + x as usize;
        #[allow(clippy::cast_possible_truncation)]
        let magnitude = mag_luma.mul_add(luma_weight, mag_hue * hue_weight) as f32;
        map.values[idx] = magnitude;
    }

    tracing::debug!(
        kernel = %params.kernel,
        hue_weight = params.hue_weight,
        width = image.width(),
        height = image.height(),
        "detected edges"
    );
    Ok(map)
}

/// Sobel, Prewitt and Scharr: convolve both 3x3 kernels, take the
/// gradient length and divide by the kernel's maximum response.
fn directional(
    grid: &SampleGrid,
    x: i64,
    y: i64,
    kx: &[[f64; 3]; 3],
    ky: &[[f64; 3]; 3],
    divisor: f64,
    with_hue: bool,
) -> (f64, f64) {
    let (mut gx_l, mut gy_l) = (0.0, 0.0);
    let (mut gx_s, mut gy_s) = (0.0, 0.0);
    let (mut gx_c, mut gy_c) = (0.0, 0.0);

    for (row, dy) in (-1..=1).enumerate() {
        for (col, dx) in (-1..=1).enumerate() {
            let s = grid.at(x + dx, y + dy);
            let (wx, wy) = (kx[row][col], ky[row][col]);
            gx_l += s.luma * wx;
            gy_l += s.luma * wy;
            if with_hue {
                gx_s += s.sin * wx;
                gy_s += s.sin * wy;
                gx_c += s.cos * wx;
                gy_c += s.cos * wy;
            }
        }
    }

    let mag_luma = gx_l.hypot(gy_l) / divisor;
    let mag_hue = if with_hue {
        gx_s.hypot(gy_s).hypot(gx_c.hypot(gy_c)) / divisor
    } else {
        0.0
    };
    (mag_luma, mag_hue)
}

/// Roberts cross: two diagonal differences, normalized by `sqrt(2)`.
fn roberts(grid: &SampleGrid, x: i64, y: i64, with_hue: bool) -> (f64, f64) {
    let p00 = grid.at(x, y);
    let p11 = grid.at(x + 1, y + 1);
    let p01 = grid.at(x, y + 1);
    let p10 = grid.at(x + 1, y);

    let mag_luma = (p00.luma - p11.luma).hypot(p01.luma - p10.luma) / SQRT2_APPROX;
    let mag_hue = if with_hue {
        let mag_s = (p00.sin - p11.sin).hypot(p01.sin - p10.sin) / SQRT2_APPROX;
        let mag_c = (p00.cos - p11.cos).hypot(p01.cos - p10.cos) / SQRT2_APPROX;
        mag_s.hypot(mag_c)
    } else {
        0.0
    };
    (mag_luma, mag_hue)
}

/// 4-neighbor Laplacian, `|sum(neighbors) - 4 * center| / 4`.
fn laplacian(grid: &SampleGrid, x: i64, y: i64, with_hue: bool) -> (f64, f64) {
    let center = grid.at(x, y);
    let neighbors = [
        grid.at(x, y - 1),
        grid.at(x - 1, y),
        grid.at(x + 1, y),
        grid.at(x, y + 1),
    ];
    let response = |channel: fn(&Sample) -> f64| -> f64 {
        let sum: f64 = neighbors.iter().map(channel).sum();
        4.0f64.mul_add(-channel(&center), sum).abs() / 4.0
    };

    let mag_luma = response(|s| s.luma);
    let mag_hue = if with_hue {
        response(|s| s.sin).hypot(response(|s| s.cos))
    } else {
        0.0
    };
    (mag_luma, mag_hue)
}

/// Morphological gradient: luma range over the 3x3 window; for hue, the
/// largest distance between any two hue vectors in the window.
fn morphological(grid: &SampleGrid, x: i64, y: i64, with_hue: bool) -> (f64, f64) {
    let mut window = [Sample::default(); 9];
    for (i, (dy, dx)) in (-1..=1)
        .flat_map(|dy| (-1..=1).map(move |dx| (dy, dx)))
        .enumerate()
    {
        window[i] = grid.at(x + dx, y + dy);
    }

    let (min_l, max_l) = window.iter().fold((255.0f64, 0.0f64), |(lo, hi), s| {
        (lo.min(s.luma), hi.max(s.luma))
    });
    let mag_luma = max_l - min_l;

    let mut mag_hue = 0.0f64;
    if with_hue {
        for (i, a) in window.iter().enumerate() {
            for b in &window[i + 1..] {
                mag_hue = mag_hue.max((a.sin - b.sin).hypot(a.cos - b.cos));
            }
        }
    }
    (mag_luma, mag_hue)
}
