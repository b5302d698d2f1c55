//! Animated image codecs for rasterkit.
//!
//! This crate decodes and encodes the two widely supported animated raster
//! formats:
//! - GIF (GIF87a/GIF89a decode, GIF89a encode)
//! - PNG and APNG
//!
//! Decoders return fully composited canvas frames; encoders take frames that
//! each carry their own offset and delay.
//!
//! ## Features
//!
//! - `gif` - GIF encoder/decoder (default)
//! - `png` - PNG/APNG encoder/decoder (default)
//! - `serde` - `Serialize`/`Deserialize` for configuration and metadata
//!
//! ## Example
//!
//! ```no_run
//! use rasterkit_images::{decode_animation, gif::encode_gif};
//!
//! # let png_data: Vec<u8> = vec![];
//! // Decode any supported animation
//! let frames = decode_animation(&png_data)?;
//!
//! // Re-encode as GIF
//! let gif_data = encode_gif(&frames)?;
//! # Ok::<(), rasterkit_core::Error>(())
//! ```

#![warn(missing_docs)]

pub mod canvas;

#[cfg(feature = "gif")]
pub mod gif;

#[cfg(feature = "png")]
pub mod png;

pub use rasterkit_core::{AnimatedImage, Error, Image, Result};

#[cfg(feature = "gif")]
pub use gif::{GifConfig, GifDecoder, GifEncoder};

#[cfg(feature = "png")]
pub use png::{ApngConfig, ApngEncoder, PngDecoder, PngInfo};

/// Detect image format from magic bytes.
pub fn detect_format(data: &[u8]) -> Option<ImageFormat> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(ImageFormat::Png);
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some(ImageFormat::Gif);
    }
    None
}

/// Decode a GIF or PNG/APNG, chosen by its signature.
pub fn decode_animation(data: &[u8]) -> Result<Vec<AnimatedImage>> {
    match detect_format(data) {
        #[cfg(feature = "gif")]
        Some(ImageFormat::Gif) => gif::decode_gif(data),
        #[cfg(feature = "png")]
        Some(ImageFormat::Png) => png::decode_png(data),
        #[allow(unreachable_patterns)]
        Some(format) => Err(Error::unsupported(format!(
            "{:?} support is not compiled in",
            format
        ))),
        None => Err(Error::unsupported("unrecognised image format")),
    }
}

/// Image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageFormat {
    /// PNG or APNG image.
    Png,
    /// GIF image.
    Gif,
}

impl ImageFormat {
    /// Get file extension for format.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
        }
    }

    /// Get MIME type for format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
        }
    }
}
