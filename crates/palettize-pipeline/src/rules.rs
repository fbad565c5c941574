//! Edge classification rules and the edge post-processing pass.
//!
//! A pixel is an edge when any enabled rule matches. The alpha band and
//! outline rules look only at alpha ("structural" edges); the algorithmic
//! rule thresholds an [`EdgeMap`]. Classified pixels receive the
//! [`AdjustmentConfig`] chain, all other pixels are untouched.

use serde::{Deserialize, Serialize};

use crate::adjust::{AdjustmentConfig, apply_contrast, clamp_channel, contrast_factor, to_channel};
use crate::color::{DEFAULT_HUE_RADIUS, hsv_unit_to_rgb, rgb_to_hsv};
use crate::edge::{EdgeDetection, EdgeKernel, EdgeMap};
use crate::types::{PipelineError, RgbaImage};

/// Marks pixels whose own alpha falls inside `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaBand {
    /// Lowest alpha counted as an edge (inclusive).
    pub min: u8,
    /// Highest alpha counted as an edge (inclusive).
    pub max: u8,
}

impl AlphaBand {
    /// Default lower bound: skips nearly invisible pixels.
    pub const DEFAULT_MIN: u8 = 32;
    /// Default upper bound: everything short of fully opaque.
    pub const DEFAULT_MAX: u8 = 254;

    #[must_use]
    const fn contains(self, alpha: u8) -> bool {
        alpha >= self.min && alpha <= self.max
    }
}

impl Default for AlphaBand {
    fn default() -> Self {
        Self {
            min: Self::DEFAULT_MIN,
            max: Self::DEFAULT_MAX,
        }
    }
}

/// Marks sufficiently opaque pixels that touch a sufficiently transparent
/// 4-neighbor. Positions outside the image count as alpha 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineRule {
    /// Minimum alpha of the pixel itself.
    pub opacity_min: u8,
    /// Maximum alpha of a neighbor for it to count as transparent.
    pub neighbor_max: u8,
}

impl OutlineRule {
    /// Default: only fully opaque pixels are outlined.
    pub const DEFAULT_OPACITY_MIN: u8 = 255;
    /// Default: only fully transparent neighbors trigger the outline.
    pub const DEFAULT_NEIGHBOR_MAX: u8 = 0;

    fn matches(self, image: &RgbaImage, x: u32, y: u32, alpha: u8) -> bool {
        if alpha < self.opacity_min {
            return false;
        }
        let neighbor_alpha = |nx: Option<u32>, ny: Option<u32>| match (nx, ny) {
            (Some(nx), Some(ny)) if nx < image.width() && ny < image.height() => {
                image.get_pixel(nx, ny).0[3]
            }
            _ => 0,
        };
        [
            (Some(x), y.checked_sub(1)),
            (Some(x), y.checked_add(1)),
            (x.checked_sub(1), Some(y)),
            (x.checked_add(1), Some(y)),
        ]
        .into_iter()
        .any(|(nx, ny)| neighbor_alpha(nx, ny) <= self.neighbor_max)
    }
}

impl Default for OutlineRule {
    fn default() -> Self {
        Self {
            opacity_min: Self::DEFAULT_OPACITY_MIN,
            neighbor_max: Self::DEFAULT_NEIGHBOR_MAX,
        }
    }
}

/// Marks pixels whose edge magnitude exceeds `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmicRule {
    /// Operator used to build the edge map.
    pub kernel: EdgeKernel,
    /// Magnitude a pixel must exceed (strictly) to count as an edge.
    pub threshold: f32,
    /// Share of the hue gradient in the magnitude, in percent.
    pub hue_priority: u8,
    /// Radius of the hue vector.
    pub hue_radius: f64,
}

impl AlgorithmicRule {
    /// Default magnitude threshold.
    pub const DEFAULT_THRESHOLD: f32 = 30.0;

    /// Edge detection parameters for this rule.
    #[must_use]
    pub fn detection(&self) -> EdgeDetection {
        EdgeDetection {
            kernel: self.kernel,
            hue_weight: f64::from(self.hue_priority) / 100.0,
            hue_radius: self.hue_radius,
        }
    }
}

impl Default for AlgorithmicRule {
    fn default() -> Self {
        Self {
            kernel: EdgeKernel::default(),
            threshold: Self::DEFAULT_THRESHOLD,
            hue_priority: 0,
            hue_radius: DEFAULT_HUE_RADIUS,
        }
    }
}

/// The set of enabled edge rules. `None` disables a rule.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeRuleConfig {
    /// Force-alpha-band rule.
    pub alpha_band: Option<AlphaBand>,
    /// Outline rule.
    pub outline: Option<OutlineRule>,
    /// Algorithmic threshold rule.
    pub algorithmic: Option<AlgorithmicRule>,
}

impl EdgeRuleConfig {
    /// Whether at least one rule is enabled.
    #[must_use]
    pub const fn any_enabled(&self) -> bool {
        self.alpha_band.is_some() || self.outline.is_some() || self.algorithmic.is_some()
    }

    /// Check rule parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an inverted alpha band,
    /// a hue priority above 100, a non-finite threshold, or invalid
    /// detection parameters.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if let Some(band) = self.alpha_band
            && band.min > band.max
        {
            return Err(PipelineError::InvalidConfig(format!(
                "alpha band min {} exceeds max {}",
                band.min, band.max
            )));
        }
        if let Some(rule) = self.algorithmic {
            if rule.hue_priority > 100 {
                return Err(PipelineError::InvalidConfig(format!(
                    "hue priority must be within 0..=100, got {}",
                    rule.hue_priority
                )));
            }
            if !rule.threshold.is_finite() {
                return Err(PipelineError::InvalidConfig(
                    "edge threshold must be finite".to_string(),
                ));
            }
            rule.detection().validate()?;
        }
        Ok(())
    }

    /// Classify a single pixel.
    ///
    /// `edges` is only consulted when the algorithmic rule is enabled; a
    /// missing map means no pixel passes that rule. Callers check that the
    /// map matches `image` before scanning it.
    pub(crate) fn classify(
        &self,
        image: &RgbaImage,
        edges: Option<&EdgeMap>,
        x: u32,
        y: u32,
    ) -> EdgeClass {
        let alpha = image.get_pixel(x, y).0[3];
        let structural = self.alpha_band.is_some_and(|band| band.contains(alpha))
            || self
                .outline
                .is_some_and(|rule| rule.matches(image, x, y, alpha));
        let algorithmic = match (self.algorithmic, edges) {
            (Some(rule), Some(map)) => {
                let idx = y as usize * map.width() as usize + x as usize;
                map.values().get(idx).is_some_and(|&v| v > rule.threshold)
            }
            _ => false,
        };
        EdgeClass {
            structural,
            algorithmic,
        }
    }

    /// Classify every pixel and tally the results.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] when `edges` does not
    /// match the image size.
    pub fn count(
        &self,
        image: &RgbaImage,
        edges: Option<&EdgeMap>,
    ) -> Result<EdgeCounts, PipelineError> {
        if let Some(map) = edges {
            map.ensure_matches(image)?;
        }
        let mut counts = EdgeCounts::default();
        for y in 0..image.height() {
            for x in 0..image.width() {
                let class = self.classify(image, edges, x, y);
                counts.structural += u64::from(class.structural);
                counts.algorithmic += u64::from(class.algorithmic);
                counts.total += u64::from(class.is_edge());
            }
        }
        Ok(counts)
    }
}

/// Classification tallies over a whole image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeCounts {
    /// Pixels matched by the alpha band or outline rule.
    pub structural: u64,
    /// Pixels matched by the algorithmic rule.
    pub algorithmic: u64,
    /// Pixels matched by any rule.
    pub total: u64,
}

/// Which rule categories matched a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeClass {
    /// Matched the alpha band or outline rule.
    pub structural: bool,
    /// Matched the algorithmic threshold.
    pub algorithmic: bool,
}

impl EdgeClass {
    /// Whether any rule matched.
    #[must_use]
    pub const fn is_edge(self) -> bool {
        self.structural || self.algorithmic
    }
}

/// Precomputed adjustment chain for classified pixels.
struct EdgeAdjuster {
    config: AdjustmentConfig,
    contrast: f64,
    sat_mult: f64,
    hue_shift: f64,
}

impl EdgeAdjuster {
    fn new(config: AdjustmentConfig) -> Self {
        Self {
            config,
            contrast: contrast_factor(config.contrast),
            sat_mult: 1.0 + f64::from(config.saturation) / 100.0,
            hue_shift: f64::from(config.hue) / 360.0,
        }
    }

    fn apply(&self, rgb: [u8; 3]) -> [u8; 3] {
        let brightness = f64::from(self.config.brightness);
        let mut channels = rgb.map(|c| {
            let mut v = f64::from(c);
            if self.config.brightness != 0 {
                v += brightness;
            }
            if self.config.contrast != 0 {
                v = apply_contrast(v, self.contrast);
            }
            clamp_channel(v)
        });

        if self.config.saturation != 0 || self.config.hue != 0 {
            let hsv = rgb_to_hsv(channels[0], channels[1], channels[2]);
            let mut h = hsv.h / 360.0;
            let mut s = hsv.s / 100.0;
            if self.config.saturation != 0 {
                s = (s * self.sat_mult).clamp(0.0, 1.0);
            }
            if self.config.hue != 0 {
                h += self.hue_shift;
                if h < 0.0 {
                    h += 1.0;
                }
                if h > 1.0 {
                    h -= 1.0;
                }
            }
            channels = hsv_unit_to_rgb(h, s, hsv.v / 100.0);
        }

        channels.map(to_channel)
    }
}

/// Apply `adjustments` to every pixel classified as an edge by `rules`.
///
/// Does nothing when `adjustments` is the identity. Alpha is never
/// changed, so classification always sees the source alpha.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for invalid rules or
/// adjustments, and [`PipelineError::DimensionMismatch`] when `edges`
/// does not match the image size.
pub fn apply_edge_post_processing(
    image: &mut RgbaImage,
    edges: Option<&EdgeMap>,
    rules: &EdgeRuleConfig,
    adjustments: &AdjustmentConfig,
) -> Result<(), PipelineError> {
    if adjustments.is_identity() {
        return Ok(());
    }
    rules.validate()?;
    adjustments.validate()?;
    if let Some(map) = edges {
        map.ensure_matches(image)?;
    }

    let adjuster = EdgeAdjuster::new(*adjustments);
    let mut adjusted = 0u64;
    for y in 0..image.height() {
        for x in 0..image.width() {
            if !rules.classify(image, edges, x, y).is_edge() {
                continue;
            }
            let pixel = image.get_pixel_mut(x, y);
            let [r, g, b] = adjuster.apply([pixel.0[0], pixel.0[1], pixel.0[2]]);
            pixel.0[0] = r;
            pixel.0[1] = g;
            pixel.0[2] = b;
            adjusted += 1;
        }
    }

    tracing::debug!(adjusted, "applied edge post-processing");
    Ok(())
}
