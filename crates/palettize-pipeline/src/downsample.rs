//! Integer "dot width" downsampling.
//!
//! Shrinks the source so each output pixel stands for a `dot_width` by
//! `dot_width` block of the input, emulating the coarse pixels of
//! limited-resolution display hardware. Runs before any other stage.

use std::fmt;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::types::RgbaImage;

/// Resampling filter used when downsampling.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality,
/// with a `None` variant to skip downsampling entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownsampleFilter {
    /// Disabled: keep the source resolution.
    None,
    /// Nearest-neighbor: hard pixel edges, no new colors.
    #[default]
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic (Catmull-Rom).
    CatmullRom,
    /// Gaussian: smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: sharpest for photos.
    Lanczos3,
}

impl DownsampleFilter {
    const fn to_image_filter(self) -> Option<FilterType> {
        match self {
            Self::None => Option::None,
            Self::Nearest => Some(FilterType::Nearest),
            Self::Triangle => Some(FilterType::Triangle),
            Self::CatmullRom => Some(FilterType::CatmullRom),
            Self::Gaussian => Some(FilterType::Gaussian),
            Self::Lanczos3 => Some(FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Target size for a given dot width: `max(1, dim / dot_width)` per axis.
#[must_use]
pub const fn target_size(width: u32, height: u32, dot_width: u32) -> (u32, u32) {
    if dot_width <= 1 {
        return (width, height);
    }
    let w = width / dot_width;
    let h = height / dot_width;
    (if w == 0 { 1 } else { w }, if h == 0 { 1 } else { h })
}

/// Downsample `image` by `dot_width` using `filter`.
///
/// Returns the (possibly unchanged) image and whether resampling was
/// actually applied. A `dot_width` of 0 or 1, or
/// [`DownsampleFilter::None`], returns an unchanged copy.
#[must_use]
pub fn downsample(image: &RgbaImage, dot_width: u32, filter: DownsampleFilter) -> (RgbaImage, bool) {
    let Some(image_filter) = filter.to_image_filter() else {
        return (image.clone(), false);
    };
    if dot_width <= 1 {
        return (image.clone(), false);
    }

    let (w, h) = target_size(image.width(), image.height(), dot_width);
    let resized = image::imageops::resize(image, w, h, image_filter);
    tracing::debug!(
        from_width = image.width(),
        from_height = image.height(),
        to_width = w,
        to_height = h,
        %filter,
        "downsampled"
    );
    (resized, true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn test_image(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([128, 128, 128, 255]))
    }

    #[test]
    fn default_filter_is_nearest() {
        assert_eq!(DownsampleFilter::default(), DownsampleFilter::Nearest);
    }

    #[test]
    fn dot_width_one_is_unchanged() {
        let img = test_image(30, 20);
        let (result, applied) = downsample(&img, 1, DownsampleFilter::Triangle);
        assert!(!applied);
        assert_eq!(result, img);
    }

    #[test]
    fn none_filter_is_unchanged() {
        let img = test_image(30, 20);
        let (result, applied) = downsample(&img, 4, DownsampleFilter::None);
        assert!(!applied);
        assert_eq!(result.dimensions(), (30, 20));
    }

    #[test]
    fn integer_division_per_axis() {
        let img = test_image(30, 21);
        let (result, applied) = downsample(&img, 4, DownsampleFilter::Nearest);
        assert!(applied);
        assert_eq!(result.dimensions(), (7, 5));
    }

    #[test]
    fn never_shrinks_below_one_pixel() {
        assert_eq!(target_size(3, 100, 8), (1, 12));
        let (result, _) = downsample(&test_image(3, 3), 10, DownsampleFilter::Lanczos3);
        assert_eq!(result.dimensions(), (1, 1));
    }

    #[test]
    fn nearest_keeps_block_colors() {
        let img = RgbaImage::from_fn(4, 2, |x, _| {
            if x < 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let (result, _) = downsample(&img, 2, DownsampleFilter::Nearest);
        assert_eq!(result.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(result.get_pixel(1, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn all_filters_produce_same_size() {
        for filter in [
            DownsampleFilter::Nearest,
            DownsampleFilter::Triangle,
            DownsampleFilter::CatmullRom,
            DownsampleFilter::Gaussian,
            DownsampleFilter::Lanczos3,
        ] {
            let (result, applied) = downsample(&test_image(64, 48), 8, filter);
            assert!(applied, "{filter}");
            assert_eq!(result.dimensions(), (8, 6), "{filter}");
        }
    }
}
