//! # rasterkit
//!
//! Animated raster images in pure Rust: GIF and PNG/APNG encoding and
//! decoding, bilinear resizing and alpha compositing.
//!
//! Every operation comes in two forms:
//! - blocking functions at the crate root, returning the result directly;
//! - [`deferred`] `async` functions that run the same computation on tokio's
//!   blocking pool.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rasterkit::{AnimatedImage, Image};
//!
//! fn main() -> rasterkit::Result<()> {
//!     let red = Image::filled(2, 2, [255, 0, 0, 255])?;
//!     let blue = Image::filled(2, 2, [0, 0, 255, 255])?;
//!     let frames = vec![AnimatedImage::new(red, 50), AnimatedImage::new(blue, 50)];
//!
//!     let gif = rasterkit::encode_gif(&frames)?;
//!     let apng = rasterkit::encode_apng(&frames)?;
//!
//!     assert_eq!(rasterkit::decode_gif(&gif)?, rasterkit::decode_png(&apng)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several crates:
//! - `rasterkit-core`: image buffers, errors, LZW, DEFLATE and checksums
//! - `rasterkit-images`: GIF and PNG/APNG codecs and the frame compositor
//!
//! This crate re-exports the most commonly used types and provides the
//! high-level API.

use std::borrow::Cow;

pub mod composite;
pub mod deferred;
pub mod prelude;
pub mod resize;
pub mod tasks;

pub use rasterkit_core::{AnimatedImage, CompressionLevel, Error, Image, Result, Rgba};
pub use rasterkit_images::gif::{DisposalMethod, GifConfig, LoopCount};
pub use rasterkit_images::png::{ApngConfig, DisposeOp, FilterStrategy};
pub use rasterkit_images::{detect_format, ImageFormat};

use tasks::{Composite, DecodeGif, DecodePng, EncodeApng, EncodeGif, Resize};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string.
pub fn version() -> &'static str {
    VERSION
}

/// Resize to `target_width` with bilinear filtering, keeping the aspect
/// ratio.
pub fn resize_image(image: &Image, target_width: u32) -> Result<Image> {
    tasks::run(&Resize {
        image: Cow::Borrowed(image),
        target_width,
    })
}

/// Blend `overlay` over `image` at (`x`, `y`), clipped to `image`.
pub fn composite_image(image: &Image, overlay: &Image, x: i64, y: i64) -> Result<Image> {
    tasks::run(&Composite {
        image: Cow::Borrowed(image),
        overlay: Cow::Borrowed(overlay),
        x,
        y,
    })
}

/// Encode frames as an animated PNG with default settings.
pub fn encode_apng(frames: &[AnimatedImage]) -> Result<Vec<u8>> {
    encode_apng_with(frames, ApngConfig::default())
}

/// Encode frames as an animated PNG.
pub fn encode_apng_with(frames: &[AnimatedImage], config: ApngConfig) -> Result<Vec<u8>> {
    tasks::run(&EncodeApng {
        frames: Cow::Borrowed(frames),
        config,
    })
}

/// Encode frames as a GIF89a with default settings.
pub fn encode_gif(frames: &[AnimatedImage]) -> Result<Vec<u8>> {
    encode_gif_with(frames, GifConfig::default())
}

/// Encode frames as a GIF89a.
pub fn encode_gif_with(frames: &[AnimatedImage], config: GifConfig) -> Result<Vec<u8>> {
    tasks::run(&EncodeGif {
        frames: Cow::Borrowed(frames),
        config,
    })
}

/// Decode a GIF into fully composited canvas frames.
pub fn decode_gif(data: &[u8]) -> Result<Vec<AnimatedImage>> {
    tasks::run(&DecodeGif {
        data: Cow::Borrowed(data),
    })
}

/// Decode a PNG or APNG into fully composited canvas frames.
pub fn decode_png(data: &[u8]) -> Result<Vec<AnimatedImage>> {
    tasks::run(&DecodePng {
        data: Cow::Borrowed(data),
    })
}

/// Decode a GIF or PNG, picked by its signature.
pub fn decode_animation(data: &[u8]) -> Result<Vec<AnimatedImage>> {
    match detect_format(data) {
        Some(ImageFormat::Gif) => decode_gif(data),
        Some(ImageFormat::Png) => decode_png(data),
        None => Err(Error::unsupported("unrecognised image format")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_decode_animation_unknown() {
        assert!(matches!(
            decode_animation(b"BM\x00\x00"),
            Err(Error::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_encode_with_config() {
        let frames = vec![AnimatedImage::new(
            Image::filled(1, 1, [0, 255, 0, 255]).unwrap(),
            3,
        )];
        let config = GifConfig {
            loop_count: LoopCount::Finite(2),
            ..GifConfig::default()
        };
        let gif = encode_gif_with(&frames, config).unwrap();
        assert_eq!(decode_animation(&gif).unwrap(), frames);

        let config = ApngConfig {
            palette: false,
            ..ApngConfig::default()
        };
        let png = encode_apng_with(&frames, config).unwrap();
        assert_eq!(decode_animation(&png).unwrap(), frames);
    }
}
