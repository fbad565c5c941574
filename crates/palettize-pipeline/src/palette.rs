//! Palette extraction and editing.
//!
//! A [`Palette`] is an ordered, deduplicated list of colors. Entry 0 is
//! always the fully transparent sentinel `(0, 0, 0, 0)`; the remaining
//! entries appear in the order they were first observed in the source
//! image.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{PipelineError, RgbaImage};

/// A single RGBA palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaletteColor {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel (0 = transparent).
    pub a: u8,
}

impl PaletteColor {
    /// The transparent sentinel stored at index 0 of every palette.
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    /// Create a color from all four channels.
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create a fully opaque color.
    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Whether this entry participates in nearest-color matching.
    #[must_use]
    pub const fn is_transparent(self) -> bool {
        self.a == 0
    }
}

/// An ordered color palette whose first entry is the transparent sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PaletteColor>", into = "Vec<PaletteColor>")]
pub struct Palette(Vec<PaletteColor>);

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette {
    /// Largest palette accepted from a generator or a serialized list,
    /// sentinel included.
    pub const MAX_LEN: usize = PaletteOptions::DEFAULT_MAX_COLORS;

    /// A palette holding only the transparent sentinel.
    #[must_use]
    pub fn new() -> Self {
        Self(vec![PaletteColor::TRANSPARENT])
    }

    /// Build a palette from a list of opaque colors, dropping duplicates
    /// and transparent entries while keeping first-seen order.
    #[must_use]
    pub fn from_colors(colors: impl IntoIterator<Item = PaletteColor>) -> Self {
        let mut seen = HashSet::new();
        let mut palette = Self::new();
        for color in colors {
            if !color.is_transparent() && seen.insert(color) {
                palette.0.push(color);
            }
        }
        palette
    }

    /// Generate an evenly spaced RGB palette with the given bit depth per
    /// channel (e.g. `(2, 3, 2)` for an RGB232 palette of 128 colors).
    ///
    /// Levels are scaled as `round(v / (levels - 1) * 255)` and emitted in
    /// red-major, then green, then blue order after the sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if any bit count is
    /// outside `1..=8`, or if the palette would exceed [`Self::MAX_LEN`]
    /// entries (more than 10 bits in total).
    pub fn rgb_levels(r_bits: u8, g_bits: u8, b_bits: u8) -> Result<Self, PipelineError> {
        for bits in [r_bits, g_bits, b_bits] {
            if !(1..=8).contains(&bits) {
                return Err(PipelineError::InvalidConfig(format!(
                    "palette bit depth must be 1..=8, got {bits}"
                )));
            }
        }
        let total_bits = u32::from(r_bits) + u32::from(g_bits) + u32::from(b_bits);
        let entries = (1usize << total_bits) + 1;
        if entries > Self::MAX_LEN {
            return Err(PipelineError::InvalidConfig(format!(
                "RGB{r_bits}{g_bits}{b_bits} needs {entries} palette entries, limit is {}",
                Self::MAX_LEN
            )));
        }
        let levels = |bits: u8| -> Vec<u8> {
            let count = 1u32 << bits;
            (0..count)
                .map(|v| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let scaled = (f64::from(v) / f64::from(count - 1) * 255.0).round() as u8;
                    scaled
                })
                .collect()
        };
        let (reds, greens, blues) = (levels(r_bits), levels(g_bits), levels(b_bits));

        let mut palette = Self::new();
        palette
            .0
            .reserve(reds.len() * greens.len() * blues.len());
        for &r in &reds {
            for &g in &greens {
                for &b in &blues {
                    palette.0.push(PaletteColor::opaque(r, g, b));
                }
            }
        }
        Ok(palette)
    }

    /// All entries, sentinel included.
    #[must_use]
    pub fn colors(&self) -> &[PaletteColor] {
        &self.0
    }

    /// Entries that take part in nearest-color matching.
    pub fn opaque_colors(&self) -> impl Iterator<Item = PaletteColor> + '_ {
        self.0.iter().copied().filter(|c| !c.is_transparent())
    }

    /// Number of entries, sentinel included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: the sentinel is never removed.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Remove the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PaletteEdit`] when `index` is out of
    /// range, targets the transparent sentinel, or would leave fewer than
    /// two entries.
    pub fn remove(&mut self, index: usize) -> Result<PaletteColor, PipelineError> {
        if index == 0 {
            return Err(PipelineError::PaletteEdit(
                "the transparent entry cannot be removed".to_string(),
            ));
        }
        if index >= self.0.len() {
            return Err(PipelineError::PaletteEdit(format!(
                "index {index} out of range for palette of {} colors",
                self.0.len()
            )));
        }
        if self.0.len() <= 2 {
            return Err(PipelineError::PaletteEdit(
                "cannot reduce palette to less than 2 colors".to_string(),
            ));
        }
        Ok(self.0.remove(index))
    }
}

impl TryFrom<Vec<PaletteColor>> for Palette {
    type Error = PipelineError;

    fn try_from(colors: Vec<PaletteColor>) -> Result<Self, Self::Error> {
        if colors.first() != Some(&PaletteColor::TRANSPARENT) {
            return Err(PipelineError::InvalidConfig(
                "palette must start with the transparent entry (0, 0, 0, 0)".to_string(),
            ));
        }
        let palette = Self::from_colors(colors);
        if palette.len() > Self::MAX_LEN {
            return Err(PipelineError::InvalidConfig(format!(
                "palette has {} entries, limit is {}",
                palette.len(),
                Self::MAX_LEN
            )));
        }
        Ok(palette)
    }
}

impl From<Palette> for Vec<PaletteColor> {
    fn from(palette: Palette) -> Self {
        palette.0
    }
}

/// Options controlling palette extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteOptions {
    /// Pixels with alpha below this value are ignored.
    pub alpha_floor: u8,
    /// Maximum number of entries, sentinel included.
    pub max_colors: usize,
}

impl PaletteOptions {
    /// Skip anti-aliasing fringes and near-invisible pixels.
    pub const DEFAULT_ALPHA_FLOOR: u8 = 32;
    /// Skip only fully transparent pixels.
    pub const TRANSPARENT_ONLY_ALPHA_FLOOR: u8 = 1;
    /// 1024 opaque colors plus the sentinel.
    pub const DEFAULT_MAX_COLORS: usize = 1025;
    /// 1023 opaque colors plus the sentinel.
    pub const COMPACT_MAX_COLORS: usize = 1024;
}

impl Default for PaletteOptions {
    fn default() -> Self {
        Self {
            alpha_floor: Self::DEFAULT_ALPHA_FLOOR,
            max_colors: Self::DEFAULT_MAX_COLORS,
        }
    }
}

/// Non-fatal conditions reported by palette extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaletteWarning {
    /// The entry cap was reached and further distinct colors were dropped.
    CapacityExceeded {
        /// The cap that was hit.
        cap: usize,
    },
}

impl std::fmt::Display for PaletteWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityExceeded { cap } => {
                write!(f, "palette color limit ({cap}) reached, some colors may be missing")
            }
        }
    }
}

/// A palette together with any warning raised while extracting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteExtraction {
    /// The (possibly partial) palette.
    pub palette: Palette,
    /// Set when extraction stopped early.
    pub warning: Option<PaletteWarning>,
}

/// Build a palette from every distinct opaque color in `image`.
///
/// Pixels with alpha below `options.alpha_floor` are skipped; all others
/// are recorded at full opacity keyed by their exact RGB value. When a new
/// distinct color is seen while the palette already holds
/// `options.max_colors` entries, extraction stops and the partial palette
/// is returned with [`PaletteWarning::CapacityExceeded`].
#[must_use = "returns the extracted palette"]
pub fn extract_palette(image: &RgbaImage, options: &PaletteOptions) -> PaletteExtraction {
    let mut seen: HashSet<[u8; 3]> = HashSet::new();
    let mut palette = Palette::new();
    let mut warning = None;

    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        if a < options.alpha_floor {
            continue;
        }
        if seen.contains(&[r, g, b]) {
            continue;
        }
        if palette.len() >= options.max_colors {
            tracing::warn!(cap = options.max_colors, "palette color limit reached");
            warning = Some(PaletteWarning::CapacityExceeded {
                cap: options.max_colors,
            });
            break;
        }
        seen.insert([r, g, b]);
        palette.0.push(PaletteColor::opaque(r, g, b));
    }

    tracing::debug!(
        colors = palette.len(),
        width = image.width(),
        height = image.height(),
        "extracted palette"
    );
    PaletteExtraction { palette, warning }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    #[test]
    fn opaque_image_still_gets_sentinel() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let result = extract_palette(&img, &PaletteOptions::default());
        assert_eq!(result.palette.colors()[0], PaletteColor::TRANSPARENT);
        assert_eq!(
            result.palette.colors(),
            &[PaletteColor::TRANSPARENT, PaletteColor::opaque(10, 20, 30)]
        );
        assert!(result.warning.is_none());
    }

    #[test]
    fn keeps_first_seen_order_and_dedupes() {
        let img = RgbaImage::from_fn(4, 1, |x, _| match x {
            0 | 2 => Rgba([200, 0, 0, 255]),
            1 => Rgba([0, 0, 0, 255]),
            _ => Rgba([0, 0, 200, 255]),
        });
        let result = extract_palette(&img, &PaletteOptions::default());
        assert_eq!(
            result.palette.colors(),
            &[
                PaletteColor::TRANSPARENT,
                PaletteColor::opaque(200, 0, 0),
                PaletteColor::opaque(0, 0, 0),
                PaletteColor::opaque(0, 0, 200),
            ]
        );
    }

    #[test]
    fn low_alpha_pixels_are_skipped_and_others_forced_opaque() {
        let img = RgbaImage::from_fn(3, 1, |x, _| match x {
            0 => Rgba([1, 1, 1, 31]),
            1 => Rgba([2, 2, 2, 32]),
            _ => Rgba([3, 3, 3, 0]),
        });
        let result = extract_palette(&img, &PaletteOptions::default());
        assert_eq!(
            result.palette.colors(),
            &[PaletteColor::TRANSPARENT, PaletteColor::opaque(2, 2, 2)]
        );

        let permissive = PaletteOptions {
            alpha_floor: PaletteOptions::TRANSPARENT_ONLY_ALPHA_FLOOR,
            ..PaletteOptions::default()
        };
        let result = extract_palette(&img, &permissive);
        assert_eq!(result.palette.len(), 3);
    }

    #[test]
    fn same_rgb_with_different_alpha_is_one_entry() {
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([5, 6, 7, 100])
            } else {
                Rgba([5, 6, 7, 255])
            }
        });
        let result = extract_palette(&img, &PaletteOptions::default());
        assert_eq!(result.palette.len(), 2);
        assert_eq!(result.palette.colors()[1].a, 255);
    }

    #[test]
    fn cap_stops_extraction_with_warning() {
        let img = RgbaImage::from_fn(10, 1, |x, _| Rgba([x as u8, 0, 0, 255]));
        let options = PaletteOptions {
            max_colors: 4,
            ..PaletteOptions::default()
        };
        let result = extract_palette(&img, &options);
        assert_eq!(result.palette.len(), 4);
        assert_eq!(
            result.warning,
            Some(PaletteWarning::CapacityExceeded { cap: 4 })
        );
    }

    #[test]
    fn exactly_filling_the_cap_is_not_a_warning() {
        let img = RgbaImage::from_fn(3, 1, |x, _| Rgba([x as u8, 0, 0, 255]));
        let options = PaletteOptions {
            max_colors: 4,
            ..PaletteOptions::default()
        };
        let result = extract_palette(&img, &options);
        assert_eq!(result.palette.len(), 4);
        assert!(result.warning.is_none());
    }

    #[test]
    fn rgb232_palette() {
        let palette = Palette::rgb_levels(2, 3, 2).unwrap();
        assert_eq!(palette.len(), 1 + 4 * 8 * 4);
        assert_eq!(palette.colors()[0], PaletteColor::TRANSPARENT);
        assert_eq!(palette.colors()[1], PaletteColor::opaque(0, 0, 0));
        assert_eq!(palette.colors()[2], PaletteColor::opaque(0, 0, 85));
        // Green has 8 levels: 255 / 7 = 36.43 -> 36.
        assert_eq!(palette.colors()[5], PaletteColor::opaque(0, 36, 0));
        assert_eq!(
            *palette.colors().last().unwrap(),
            PaletteColor::opaque(255, 255, 255)
        );
    }

    #[test]
    fn rgb_levels_rejects_bad_depth() {
        assert!(matches!(
            Palette::rgb_levels(0, 3, 2),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert!(matches!(
            Palette::rgb_levels(2, 9, 2),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rgb_levels_respects_entry_limit() {
        // 10 bits: 1024 colors plus the sentinel fills the limit exactly.
        let largest = Palette::rgb_levels(4, 3, 3).unwrap();
        assert_eq!(largest.len(), Palette::MAX_LEN);
        for (r, g, b) in [(4, 4, 3), (8, 8, 8), (1, 1, 8), (8, 2, 1)] {
            assert!(
                matches!(
                    Palette::rgb_levels(r, g, b),
                    Err(PipelineError::InvalidConfig(_))
                ),
                "RGB{r}{g}{b} should be rejected"
            );
        }
    }

    #[test]
    fn deserialized_palette_respects_entry_limit() {
        let colors = |count: u32| -> Vec<PaletteColor> {
            std::iter::once(PaletteColor::TRANSPARENT)
                .chain((0..count).map(|i| {
                    let [_, r, g, b] = i.to_be_bytes();
                    PaletteColor::opaque(r, g, b)
                }))
                .collect()
        };

        let full = serde_json::to_string(&colors(1024)).unwrap();
        assert_eq!(serde_json::from_str::<Palette>(&full).unwrap().len(), Palette::MAX_LEN);

        let over = serde_json::to_string(&colors(1025)).unwrap();
        assert!(serde_json::from_str::<Palette>(&over).is_err());
        assert!(matches!(
            Palette::try_from(colors(1025)),
            Err(PipelineError::InvalidConfig(_))
        ));

        // Duplicates collapse before the limit is checked.
        let mut repeated = colors(1024);
        repeated.extend(colors(1024).into_iter().skip(1));
        assert_eq!(Palette::try_from(repeated).unwrap().len(), Palette::MAX_LEN);
    }

    #[test]
    fn is_empty_is_false_even_for_sentinel_only() {
        let palette = Palette::new();
        assert_eq!(palette.len(), 1);
        assert!(!palette.is_empty());
    }

    #[test]
    fn remove_guards_sentinel_and_minimum_size() {
        let mut palette = Palette::from_colors([
            PaletteColor::opaque(1, 1, 1),
            PaletteColor::opaque(2, 2, 2),
        ]);
        assert!(matches!(palette.remove(0), Err(PipelineError::PaletteEdit(_))));
        assert!(matches!(palette.remove(7), Err(PipelineError::PaletteEdit(_))));
        assert_eq!(palette.remove(1).unwrap(), PaletteColor::opaque(1, 1, 1));
        assert!(matches!(palette.remove(1), Err(PipelineError::PaletteEdit(_))));
        assert_eq!(palette.len(), 2);
    }

    #[test]
    fn from_colors_skips_transparent_and_duplicates() {
        let palette = Palette::from_colors([
            PaletteColor::opaque(9, 9, 9),
            PaletteColor::TRANSPARENT,
            PaletteColor::opaque(9, 9, 9),
        ]);
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.opaque_colors().count(), 1);
    }

    #[test]
    fn serde_round_trip_and_sentinel_check() {
        let palette = Palette::rgb_levels(1, 1, 1).unwrap();
        let json = serde_json::to_string(&palette).unwrap();
        let back: Palette = serde_json::from_str(&json).unwrap();
        assert_eq!(palette, back);

        let missing_sentinel = r#"[{"r":1,"g":2,"b":3,"a":255}]"#;
        assert!(serde_json::from_str::<Palette>(missing_sentinel).is_err());
    }
}
