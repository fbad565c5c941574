//! Palette-constrained color reduction.
//!
//! Every visible pixel is replaced by the closest opaque palette entry
//! under the selected [`DistanceMetric`]. Ties keep the earlier palette
//! entry. Fully transparent pixels become `(0, 0, 0, 0)` without a search.

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::color::{Hsv, Lab, rgb_to_hsv, rgb_to_lab};
use crate::edge::EdgeMap;
use crate::palette::{Palette, PaletteColor};
use crate::types::{PipelineError, RgbaImage};

/// Edge magnitude a pixel must exceed to receive the edge-strength boost.
pub const EDGE_BOOST_THRESHOLD: f32 = 30.0;

/// Relative weights of the HSV components, in percent.
///
/// The weights are not normalized; they need not sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HsvWeights {
    /// Hue weight.
    pub h: u8,
    /// Saturation weight.
    pub s: u8,
    /// Value weight.
    pub v: u8,
}

impl HsvWeights {
    /// Default hue weight.
    pub const DEFAULT_H: u8 = 50;
    /// Default saturation weight.
    pub const DEFAULT_S: u8 = 30;
    /// Default value weight.
    pub const DEFAULT_V: u8 = 20;

    fn distance(self, a: &Hsv, b: &Hsv) -> f64 {
        let mut dh = (a.h - b.h).abs();
        if dh > 180.0 {
            dh = 360.0 - dh;
        }
        let ndh = dh / 180.0;
        let nds = (a.s - b.s).abs() / 100.0;
        let ndv = (a.v - b.v).abs() / 100.0;
        ndh.mul_add(
            f64::from(self.h) / 100.0,
            nds.mul_add(f64::from(self.s) / 100.0, ndv * f64::from(self.v) / 100.0),
        )
    }
}

impl Default for HsvWeights {
    fn default() -> Self {
        Self {
            h: Self::DEFAULT_H,
            s: Self::DEFAULT_S,
            v: Self::DEFAULT_V,
        }
    }
}

/// How "closest palette color" is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Squared Euclidean RGB distance.
    #[default]
    Nearest,
    /// Weighted, normalized HSV component distance.
    Weighted(HsvWeights),
    /// Squared Euclidean CIELAB distance.
    Cielab,
    /// Squared RGB distance weighted 0.30 / 0.59 / 0.11 per channel.
    Luma,
}

impl DistanceMetric {
    /// Lowercase name used in configuration files and the CLI.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Weighted(_) => "weighted",
            Self::Cielab => "cielab",
            Self::Luma => "luma",
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Palette matching options.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Percentage by which strong-edge pixels are scaled before matching,
    /// `-100.0..=100.0`. Zero disables the boost.
    pub edge_strength: f64,
}

impl ReductionConfig {
    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when `edge_strength` is
    /// outside `-100.0..=100.0`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if (-100.0..=100.0).contains(&self.edge_strength) {
            Ok(())
        } else {
            Err(PipelineError::InvalidConfig(format!(
                "edge strength must be within -100..=100, got {}",
                self.edge_strength
            )))
        }
    }
}

fn rgb_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let (dr, dg, db) = (a[0] - b[0], a[1] - b[1], a[2] - b[2]);
    dr.mul_add(dr, dg.mul_add(dg, db * db))
}

fn luma_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let (dr, dg, db) = (a[0] - b[0], a[1] - b[1], a[2] - b[2]);
    (dr * dr).mul_add(0.30, (dg * dg).mul_add(0.59, db * db * 0.11))
}

fn to_rgb(color: PaletteColor) -> [f64; 3] {
    [color.r, color.g, color.b].map(f64::from)
}

/// Matches pixels against palette entries projected into key space `K`.
struct Matcher<K, F, D> {
    entries: Vec<(K, PaletteColor)>,
    key: F,
    distance: D,
}

impl<K, F, D> Matcher<K, F, D>
where
    F: Fn([f64; 3]) -> K,
    D: Fn(&K, &K) -> f64,
{
    fn new(colors: &[PaletteColor], key: F, distance: D) -> Self {
        let entries = colors.iter().map(|&c| (key(to_rgb(c)), c)).collect();
        Self {
            entries,
            key,
            distance,
        }
    }

    fn nearest(&self, rgb: [f64; 3]) -> Option<PaletteColor> {
        let target = (self.key)(rgb);
        let mut best: Option<(f64, PaletteColor)> = None;
        for (key, color) in &self.entries {
            let d = (self.distance)(&target, key);
            if best.is_none_or(|(min, _)| d < min) {
                best = Some((d, *color));
            }
        }
        best.map(|(_, color)| color)
    }

    fn reduce(&self, image: &RgbaImage, boost: Option<(f64, &EdgeMap)>) -> RgbaImage {
        let mut out = RgbaImage::new(image.width(), image.height());
        for (x, y, pixel) in image.enumerate_pixels() {
            let [r, g, b, a] = pixel.0;
            if a == 0 {
                continue;
            }
            let mut rgb = [r, g, b].map(f64::from);
            if let Some((factor, map)) = boost
                && map.get(x, y) > EDGE_BOOST_THRESHOLD
            {
                rgb = rgb.map(|c| (c * factor).clamp(0.0, 255.0));
            }
            if let Some(color) = self.nearest(rgb) {
                out.put_pixel(x, y, Rgba([color.r, color.g, color.b, 255]));
            }
        }
        out
    }
}

/// Reduce `image` to the colors of `palette`.
///
/// When `config.edge_strength` is non-zero and `edges` is given, pixels
/// whose edge magnitude exceeds [`EDGE_BOOST_THRESHOLD`] have their RGB
/// scaled by `1 + edge_strength / 100` (and clamped) before matching.
/// Matched pixels are written fully opaque.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyPalette`] when a visible pixel needs a
/// match but the palette has no opaque entry,
/// [`PipelineError::DimensionMismatch`] when `edges` does not match the
/// image, and [`PipelineError::InvalidConfig`] for an out-of-range edge
/// strength.
pub fn reduce_image(
    image: &RgbaImage,
    palette: &Palette,
    edges: Option<&EdgeMap>,
    config: &ReductionConfig,
) -> Result<RgbaImage, PipelineError> {
    config.validate()?;
    if let Some(map) = edges {
        map.ensure_matches(image)?;
    }

    let colors: Vec<PaletteColor> = palette.opaque_colors().collect();
    if colors.is_empty() && image.pixels().any(|p| p.0[3] != 0) {
        return Err(PipelineError::EmptyPalette);
    }

    #[allow(clippy::float_cmp)]
    let boost = edges
        .filter(|_| config.edge_strength != 0.0)
        .map(|map| (1.0 + config.edge_strength / 100.0, map));

    let reduced = match config.metric {
        DistanceMetric::Nearest => {
            Matcher::new(&colors, |c| c, rgb_distance).reduce(image, boost)
        }
        DistanceMetric::Luma => Matcher::new(&colors, |c| c, luma_distance).reduce(image, boost),
        DistanceMetric::Weighted(weights) => Matcher::new(
            &colors,
            |[r, g, b]| rgb_to_hsv(r, g, b),
            move |a: &Hsv, b: &Hsv| weights.distance(a, b),
        )
        .reduce(image, boost),
        DistanceMetric::Cielab => Matcher::new(
            &colors,
            |[r, g, b]| rgb_to_lab(r, g, b),
            |a: &Lab, b: &Lab| a.distance_squared(*b),
        )
        .reduce(image, boost),
    };

    tracing::debug!(
        metric = %config.metric,
        palette_size = colors.len(),
        edge_strength = config.edge_strength,
        "reduced image"
    );
    Ok(reduced)
}
