//! palettize-export: Pure image serializers (sans-IO)
//!
//! Turns pipeline buffers into file bytes. Supports PNG and lossless
//! WebP, plus a swatch strip rendering of a palette.

pub mod raster;
pub mod strip;

pub use raster::{ExportError, ImageFormat, encode, encode_png, encode_webp};
pub use strip::{SWATCH_SIZE, palette_strip};
