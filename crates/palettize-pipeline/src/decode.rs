//! Image decoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the 8-bit
//! RGBA buffer every later stage works on: top-left origin, row-major.

use crate::types::{PipelineError, RgbaImage};

/// Decode raw image bytes into an RGBA buffer.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
#[must_use = "returns the decoded image"]
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    tracing::debug!(width = img.width(), height = img.height(), "decoded image");
    Ok(img.to_rgba8())
}
