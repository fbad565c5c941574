//! Global tone and color adjustments.
//!
//! [`apply_pre_processing`] runs before edge detection and touches every
//! visible pixel. The same brightness and contrast arithmetic is reused
//! by the edge post-processing stage through [`AdjustmentConfig`].
//!
//! Stage order is fixed: RGB offset, brightness, contrast (then clamp),
//! saturation (then clamp), gamma.

use serde::{Deserialize, Serialize};

use crate::types::{PipelineError, RgbaImage};

/// Contrast transform factor, `259 (c + 255) / (255 (259 - c))`.
#[must_use]
pub fn contrast_factor(contrast: i32) -> f64 {
    let c = f64::from(contrast);
    (259.0 * (c + 255.0)) / (255.0 * (259.0 - c))
}

/// Apply `factor` around the 128 midpoint.
#[must_use]
pub fn apply_contrast(value: f64, factor: f64) -> f64 {
    factor.mul_add(value - 128.0, 128.0)
}

/// Clamp a channel to the displayable range.
#[must_use]
pub fn clamp_channel(value: f64) -> f64 {
    value.clamp(0.0, 255.0)
}

/// Round a clamped channel back to 8 bits.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_channel(value: f64) -> u8 {
    clamp_channel(value).round() as u8
}

fn check_range(name: &str, value: i32, lo: i32, hi: i32) -> Result<(), PipelineError> {
    if (lo..=hi).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::InvalidConfig(format!(
            "{name} must be within {lo}..={hi}, got {value}"
        )))
    }
}

/// Tone/color adjustment shared by pre- and post-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentConfig {
    /// Additive brightness, `-255..=255`.
    pub brightness: i32,
    /// Contrast, `-255..=255`.
    pub contrast: i32,
    /// Saturation change in percent, `-100..=100`.
    pub saturation: i32,
    /// Hue rotation in degrees, `-180..=180`.
    pub hue: i32,
}

impl AdjustmentConfig {
    /// Whether the adjustment leaves every pixel unchanged.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.brightness == 0 && self.contrast == 0 && self.saturation == 0 && self.hue == 0
    }

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for any out-of-range field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        check_range("brightness", self.brightness, -255, 255)?;
        check_range("contrast", self.contrast, -255, 255)?;
        check_range("saturation", self.saturation, -100, 100)?;
        check_range("hue", self.hue, -180, 180)
    }
}

/// Configuration for the global pre-processing pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreProcessConfig {
    /// Additive red offset, `-255..=255`.
    pub red: i32,
    /// Additive green offset, `-255..=255`.
    pub green: i32,
    /// Additive blue offset, `-255..=255`.
    pub blue: i32,
    /// Additive brightness, `-255..=255`.
    pub brightness: i32,
    /// Contrast, `-255..=255`.
    pub contrast: i32,
    /// Saturation change in percent, `-100..=100`.
    pub saturation: i32,
    /// Gamma exponent; values above 1 brighten midtones.
    pub gamma: f64,
}

impl Default for PreProcessConfig {
    fn default() -> Self {
        Self {
            red: 0,
            green: 0,
            blue: 0,
            brightness: 0,
            contrast: 0,
            saturation: 0,
            gamma: Self::DEFAULT_GAMMA,
        }
    }
}

impl PreProcessConfig {
    /// Neutral gamma.
    pub const DEFAULT_GAMMA: f64 = 1.0;

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for any out-of-range field
    /// or a gamma that is not a finite positive number.
    pub fn validate(&self) -> Result<(), PipelineError> {
        check_range("red offset", self.red, -255, 255)?;
        check_range("green offset", self.green, -255, 255)?;
        check_range("blue offset", self.blue, -255, 255)?;
        check_range("brightness", self.brightness, -255, 255)?;
        check_range("contrast", self.contrast, -255, 255)?;
        check_range("saturation", self.saturation, -100, 100)?;
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "gamma must be positive, got {}",
                self.gamma
            )));
        }
        Ok(())
    }
}

/// 256-entry gamma lookup, `round(clamp(255 * (i / 255)^(1 / gamma)))`.
///
/// Returns `None` for a neutral gamma.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn gamma_table(gamma: f64) -> Option<[u8; 256]> {
    if gamma == 1.0 {
        return None;
    }
    let inverse = 1.0 / gamma;
    let mut table = [0u8; 256];
    for (i, entry) in (0u8..=255).zip(table.iter_mut()) {
        *entry = to_channel((f64::from(i) / 255.0).powf(inverse) * 255.0);
    }
    Some(table)
}

/// Apply the global pre-processing pass in place.
///
/// Fully transparent pixels are left untouched and alpha is never
/// modified. The caller is expected to pass a working copy.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`PreProcessConfig::validate`]; the image is not modified in that case.
pub fn apply_pre_processing(
    image: &mut RgbaImage,
    config: &PreProcessConfig,
) -> Result<(), PipelineError> {
    config.validate()?;

    let factor = (config.contrast != 0).then(|| contrast_factor(config.contrast));
    let sat_mult = 1.0 + f64::from(config.saturation) / 100.0;
    let gamma = gamma_table(config.gamma);
    let offsets = [config.red, config.green, config.blue].map(f64::from);
    let brightness = f64::from(config.brightness);

    for pixel in image.pixels_mut() {
        if pixel.0[3] == 0 {
            continue;
        }

        let mut rgb = [0.0f64; 3];
        for (c, value) in rgb.iter_mut().enumerate() {
            let mut v = f64::from(pixel.0[c]) + offsets[c] + brightness;
            if let Some(factor) = factor {
                v = apply_contrast(v, factor);
            }
            *value = clamp_channel(v);
        }

        if config.saturation != 0 {
            let lum = 0.2126f64.mul_add(rgb[0], 0.7152f64.mul_add(rgb[1], 0.0722 * rgb[2]));
            for value in &mut rgb {
                *value = clamp_channel((*value - lum).mul_add(sat_mult, lum));
            }
        }

        for (c, value) in rgb.into_iter().enumerate() {
            let v = to_channel(value);
            pixel.0[c] = gamma.map_or(v, |table| table[usize::from(v)]);
        }
    }

    tracing::debug!(
        brightness = config.brightness,
        contrast = config.contrast,
        saturation = config.saturation,
        gamma = config.gamma,
        "applied pre-processing"
    );
    Ok(())
}
