//! Palette swatch strip.

use image::Rgba;
use palettize_pipeline::{Palette, RgbaImage};

/// Edge length of one swatch in pixels.
pub const SWATCH_SIZE: u32 = 8;

/// Render `palette` as a horizontal strip of square swatches, one per
/// entry in palette order. The transparent sentinel renders transparent.
#[must_use]
pub fn palette_strip(palette: &Palette) -> RgbaImage {
    let colors = palette.colors();
    let count = u32::try_from(colors.len()).unwrap_or(u32::MAX);
    RgbaImage::from_fn(count.saturating_mul(SWATCH_SIZE), SWATCH_SIZE, |x, _| {
        let c = colors[(x / SWATCH_SIZE) as usize];
        Rgba([c.r, c.g, c.b, c.a])
    })
}
