//! Color space conversions shared by every pipeline stage.
//!
//! All functions are pure and take channel values on the 0-255 scale as
//! `f64`, so they accept both raw 8-bit samples and intermediate values
//! (e.g. an edge-boosted pixel that has not been rounded yet).

use std::f64::consts::TAU;

/// Luma weights used for edge detection (`0.299 R + 0.587 G + 0.114 B`).
pub const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Radius the hue unit vector is scaled to.
///
/// A full hue reversal (red to cyan) spans the diameter, 255, which keeps
/// hue gradients on the same scale as a black-to-white luma step.
pub const DEFAULT_HUE_RADIUS: f64 = 127.5;

/// A color in HSV space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    /// Hue in degrees, `[0, 360)`.
    pub h: f64,
    /// Saturation in percent, `[0, 100]`.
    pub s: f64,
    /// Value in percent, `[0, 100]`.
    pub v: f64,
}

/// A color in CIELAB space (D65 white point).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    /// Lightness.
    pub l: f64,
    /// Green-red axis.
    pub a: f64,
    /// Blue-yellow axis.
    pub b: f64,
}

impl Lab {
    /// Squared Euclidean distance to another Lab color.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        dl.mul_add(dl, da.mul_add(da, db * db))
    }
}

/// Perceptual luma of an RGB triple, `0.299 R + 0.587 G + 0.114 B`.
#[must_use]
pub fn luma(r: f64, g: f64, b: f64) -> f64 {
    LUMA_WEIGHTS[0] * r + LUMA_WEIGHTS[1] * g + LUMA_WEIGHTS[2] * b
}

/// Hue as a fraction of a full turn, `[0, 1)`. Achromatic colors yield 0.
fn hue_fraction(r: f64, g: f64, b: f64) -> f64 {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;
    if d == 0.0 {
        return 0.0;
    }
    #[allow(clippy::float_cmp)]
    let sector = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    sector / 6.0
}

/// Convert RGB (0-255) to HSV with `h` in degrees and `s`, `v` in percent.
#[must_use]
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> Hsv {
    let (r, g, b) = (r / 255.0, g / 255.0, b / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let s = if max == 0.0 { 0.0 } else { (max - min) / max };
    Hsv {
        h: hue_fraction(r, g, b) * 360.0,
        s: s * 100.0,
        v: max * 100.0,
    }
}

/// Convert HSV (all components normalized to `[0, 1]`) back to RGB
/// (0-255, unrounded) using the standard six-sector reconstruction.
#[must_use]
pub fn hsv_unit_to_rgb(h: f64, s: f64, v: f64) -> [f64; 3] {
    let scaled = h * 6.0;
    let sector = scaled.floor();
    let f = scaled - sector;
    let p = v * (1.0 - s);
    let q = v * f.mul_add(-s, 1.0);
    let t = v * (1.0 - f).mul_add(-s, 1.0);

    #[allow(clippy::cast_possible_truncation)]
    let (r, g, b) = match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [r * 255.0, g * 255.0, b * 255.0]
}

/// sRGB transfer function: gamma-encoded `[0, 1]` to linear light.
fn srgb_to_linear(c: f64) -> f64 {
    if c > 0.040_45 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

/// CIELAB companding with the 0.008856 linear threshold.
fn lab_f(t: f64) -> f64 {
    if t > 0.008_856 {
        t.cbrt()
    } else {
        7.787f64.mul_add(t, 16.0 / 116.0)
    }
}

/// Convert RGB (0-255) to CIELAB via linear sRGB and XYZ (D65).
#[must_use]
pub fn rgb_to_lab(r: f64, g: f64, b: f64) -> Lab {
    let r = srgb_to_linear(r / 255.0);
    let g = srgb_to_linear(g / 255.0);
    let b = srgb_to_linear(b / 255.0);

    let x = (r * 0.4124 + g * 0.3576 + b * 0.1805) / 0.950_47;
    let y = r * 0.2126 + g * 0.7152 + b * 0.0722;
    let z = (r * 0.0193 + g * 0.1192 + b * 0.9505) / 1.088_83;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    Lab {
        l: 116.0f64.mul_add(fy, -16.0),
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// Hue of an RGB color as a `(sin, cos)` vector scaled to `radius`.
///
/// Achromatic colors map to hue 0, i.e. `(0, radius)`.
#[must_use]
pub fn hue_unit_vector(r: f64, g: f64, b: f64, radius: f64) -> (f64, f64) {
    let angle = hue_fraction(r / 255.0, g / 255.0, b / 255.0) * TAU;
    (angle.sin() * radius, angle.cos() * radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn hsv_primaries() {
        let red = rgb_to_hsv(255.0, 0.0, 0.0);
        assert!(close(red.h, 0.0, 1e-9));
        assert!(close(red.s, 100.0, 1e-9));
        assert!(close(red.v, 100.0, 1e-9));

        let green = rgb_to_hsv(0.0, 255.0, 0.0);
        assert!(close(green.h, 120.0, 1e-9));

        let blue = rgb_to_hsv(0.0, 0.0, 255.0);
        assert!(close(blue.h, 240.0, 1e-9));

        let magenta = rgb_to_hsv(255.0, 0.0, 255.0);
        assert!(close(magenta.h, 300.0, 1e-9));
    }

    #[test]
    fn hsv_achromatic_has_zero_hue_and_saturation() {
        let gray = rgb_to_hsv(128.0, 128.0, 128.0);
        assert!(close(gray.h, 0.0, 1e-12));
        assert!(close(gray.s, 0.0, 1e-12));
        assert!(close(gray.v, 128.0 / 255.0 * 100.0, 1e-9));

        let black = rgb_to_hsv(0.0, 0.0, 0.0);
        assert!(close(black.s, 0.0, 1e-12));
        assert!(close(black.v, 0.0, 1e-12));
    }

    #[test]
    fn hsv_round_trip_through_sectors() {
        for &(r, g, b) in &[
            (255.0, 0.0, 0.0),
            (200.0, 180.0, 10.0),
            (30.0, 220.0, 90.0),
            (0.0, 100.0, 250.0),
            (140.0, 20.0, 200.0),
            (250.0, 40.0, 120.0),
        ] {
            let hsv = rgb_to_hsv(r, g, b);
            let [r2, g2, b2] = hsv_unit_to_rgb(hsv.h / 360.0, hsv.s / 100.0, hsv.v / 100.0);
            assert!(close(r, r2, 1e-6), "r {r} vs {r2}");
            assert!(close(g, g2, 1e-6), "g {g} vs {g2}");
            assert!(close(b, b2, 1e-6), "b {b} vs {b2}");
        }
    }

    #[test]
    fn hsv_to_rgb_full_turn_wraps_to_red() {
        let [r, g, b] = hsv_unit_to_rgb(1.0, 1.0, 1.0);
        assert!(close(r, 255.0, 1e-9));
        assert!(close(g, 0.0, 1e-9));
        assert!(close(b, 0.0, 1e-9));
    }

    #[test]
    fn lab_white_and_black() {
        let white = rgb_to_lab(255.0, 255.0, 255.0);
        assert!(close(white.l, 100.0, 0.01), "L={}", white.l);
        assert!(close(white.a, 0.0, 0.05), "a={}", white.a);
        assert!(close(white.b, 0.0, 0.05), "b={}", white.b);

        let black = rgb_to_lab(0.0, 0.0, 0.0);
        assert!(close(black.l, 0.0, 1e-9));
    }

    #[test]
    fn lab_red_reference_values() {
        // sRGB red is approximately L=53.24, a=80.09, b=67.20.
        let red = rgb_to_lab(255.0, 0.0, 0.0);
        assert!(close(red.l, 53.24, 0.05), "L={}", red.l);
        assert!(close(red.a, 80.09, 0.1), "a={}", red.a);
        assert!(close(red.b, 67.20, 0.1), "b={}", red.b);
    }

    #[test]
    fn lab_distance_squared_is_symmetric() {
        let a = rgb_to_lab(10.0, 200.0, 30.0);
        let b = rgb_to_lab(90.0, 20.0, 130.0);
        assert!(close(a.distance_squared(b), b.distance_squared(a), 1e-9));
        assert!(close(a.distance_squared(a), 0.0, 1e-12));
    }

    #[test]
    fn luma_weights_sum_to_one() {
        assert!(close(luma(255.0, 255.0, 255.0), 255.0, 1e-9));
        assert!(luma(0.0, 255.0, 0.0) > luma(255.0, 0.0, 0.0));
        assert!(luma(255.0, 0.0, 0.0) > luma(0.0, 0.0, 255.0));
    }

    #[test]
    fn hue_vector_has_requested_radius() {
        let (s, c) = hue_unit_vector(0.0, 255.0, 0.0, DEFAULT_HUE_RADIUS);
        assert!(close(s.hypot(c), DEFAULT_HUE_RADIUS, 1e-9));
        // 120 degrees: sin = +0.866, cos = -0.5
        assert!(close(s, DEFAULT_HUE_RADIUS * (3f64.sqrt() / 2.0), 1e-9));
        assert!(close(c, -DEFAULT_HUE_RADIUS / 2.0, 1e-9));
    }

    #[test]
    fn hue_vector_of_gray_points_at_zero_degrees() {
        let (s, c) = hue_unit_vector(90.0, 90.0, 90.0, 10.0);
        assert!(close(s, 0.0, 1e-12));
        assert!(close(c, 10.0, 1e-12));
    }

    #[test]
    fn opposite_hues_span_the_diameter() {
        let red = hue_unit_vector(255.0, 0.0, 0.0, DEFAULT_HUE_RADIUS);
        let cyan = hue_unit_vector(0.0, 255.0, 255.0, DEFAULT_HUE_RADIUS);
        let dist = (red.0 - cyan.0).hypot(red.1 - cyan.1);
        assert!(close(dist, 255.0, 1e-9));
    }
}
