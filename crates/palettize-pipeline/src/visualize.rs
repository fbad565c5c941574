//! Color-coded view of which edge rules fire where.

use image::Rgba;

use crate::edge::EdgeMap;
use crate::rules::{EdgeClass, EdgeRuleConfig};
use crate::types::{PipelineError, RgbaImage};

/// Background for pixels no rule matched.
pub const NONE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
/// Pixels matched only by the alpha band or outline rule.
pub const STRUCTURAL_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);
/// Pixels matched only by the algorithmic rule.
pub const ALGORITHMIC_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Pixels matched by both categories.
pub const BOTH_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

const fn color_for(class: EdgeClass) -> Rgba<u8> {
    match (class.structural, class.algorithmic) {
        (true, true) => BOTH_COLOR,
        (true, false) => STRUCTURAL_COLOR,
        (false, true) => ALGORITHMIC_COLOR,
        (false, false) => NONE_COLOR,
    }
}

/// Render a fully opaque buffer of the same size as `image` showing the
/// classification of every pixel.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] when `edges` does not
/// match the image size.
pub fn create_edge_visualization(
    image: &RgbaImage,
    edges: Option<&EdgeMap>,
    rules: &EdgeRuleConfig,
) -> Result<RgbaImage, PipelineError> {
    if let Some(map) = edges {
        map.ensure_matches(image)?;
    }
    Ok(RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        color_for(rules.classify(image, edges, x, y))
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rules::{AlgorithmicRule, AlphaBand};

    #[test]
    fn colors_encode_rule_categories() {
        // Alpha: 128 (band), 255, 128 (band), 255
        let img = RgbaImage::from_fn(4, 1, |x, _| {
            Rgba([9, 9, 9, if x % 2 == 0 { 128 } else { 255 }])
        });
        // Edge: strong, strong, weak, weak
        let map = EdgeMap::from_raw(4, 1, vec![90.0, 90.0, 1.0, 1.0]).unwrap();
        let rules = EdgeRuleConfig {
            alpha_band: Some(AlphaBand::default()),
            algorithmic: Some(AlgorithmicRule::default()),
            ..EdgeRuleConfig::default()
        };
        let vis = create_edge_visualization(&img, Some(&map), &rules).unwrap();
        assert_eq!(*vis.get_pixel(0, 0), BOTH_COLOR);
        assert_eq!(*vis.get_pixel(1, 0), ALGORITHMIC_COLOR);
        assert_eq!(*vis.get_pixel(2, 0), STRUCTURAL_COLOR);
        assert_eq!(*vis.get_pixel(3, 0), NONE_COLOR);
    }

    #[test]
    fn output_is_opaque_even_for_transparent_source() {
        let img = RgbaImage::new(3, 2);
        let vis = create_edge_visualization(&img, None, &EdgeRuleConfig::default()).unwrap();
        assert_eq!(vis.dimensions(), (3, 2));
        assert!(vis.pixels().all(|p| *p == NONE_COLOR));
    }

    #[test]
    fn source_is_not_modified() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 100]));
        let copy = img.clone();
        let rules = EdgeRuleConfig {
            alpha_band: Some(AlphaBand::default()),
            ..EdgeRuleConfig::default()
        };
        let _ = create_edge_visualization(&img, None, &rules).unwrap();
        assert_eq!(img, copy);
    }

    #[test]
    fn rejects_mismatched_map() {
        let img = RgbaImage::new(3, 3);
        let map = EdgeMap::zeros(3, 2);
        let rules = EdgeRuleConfig::default();
        assert!(create_edge_visualization(&img, Some(&map), &rules).is_err());
    }
}
