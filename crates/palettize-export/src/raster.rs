//! PNG and WebP encoding of RGBA buffers.

use std::fmt;
use std::str::FromStr;

use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};
use palettize_pipeline::RgbaImage;

/// Errors raised while serializing an image.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The encoder rejected the buffer.
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),

    /// The requested output format is not supported.
    #[error("unsupported output format {0:?} (expected png or webp)")]
    UnsupportedFormat(String),
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// Portable Network Graphics.
    #[default]
    Png,
    /// Lossless WebP.
    WebP,
}

impl ImageFormat {
    /// Pick a format from a file extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::UnsupportedFormat`] for anything other than
    /// `png` or `webp`.
    pub fn from_extension(ext: &str) -> Result<Self, ExportError> {
        ext.parse()
    }

    /// Conventional file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Encode `image` as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Encode `image` as lossless WebP bytes.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails.
pub fn encode_webp(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    WebPEncoder::new_lossless(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Encode `image` in the given format.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder fails.
pub fn encode(image: &RgbaImage, format: ImageFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ImageFormat::Png => encode_png(image),
        ImageFormat::WebP => encode_webp(image),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn checker() -> RgbaImage {
        RgbaImage::from_fn(5, 3, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 255, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn png_is_lossless() {
        let img = checker();
        let bytes = encode_png(&img).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        let decoded = palettize_pipeline::decode(&bytes).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn webp_is_lossless() {
        let img = checker();
        let bytes = encode_webp(&img).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
        let decoded = palettize_pipeline::decode(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), img.dimensions());
        for (a, b) in decoded.pixels().zip(img.pixels()) {
            // Fully transparent pixels may lose their color channels.
            if b.0[3] == 0 {
                assert_eq!(a.0[3], 0);
            } else {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn format_parsing() {
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!(ImageFormat::from_extension("webp").unwrap(), ImageFormat::WebP);
        assert!(matches!(
            ImageFormat::from_extension("gif"),
            Err(ExportError::UnsupportedFormat(_))
        ));
        assert_eq!(ImageFormat::WebP.to_string(), "webp");
    }

    #[test]
    fn encode_dispatches_by_format() {
        let img = checker();
        assert_eq!(encode(&img, ImageFormat::Png).unwrap(), encode_png(&img).unwrap());
        assert_eq!(&encode(&img, ImageFormat::WebP).unwrap()[0..4], b"RIFF");
    }
}
