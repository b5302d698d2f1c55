//! Prelude module for convenient imports.
//!
//! ```rust
//! use rasterkit::prelude::*;
//! ```
//!
//! This brings in the image and error types, the codec settings and every
//! blocking operation. Deferred operations stay under [`crate::deferred`]
//! because they share names with the blocking ones.

// Core error types
pub use crate::{Error, Result};

// Image types
pub use crate::{AnimatedImage, Image, Rgba};

// Codec settings
pub use crate::{ApngConfig, CompressionLevel, DisposalMethod, DisposeOp, FilterStrategy};
pub use crate::{GifConfig, ImageFormat, LoopCount};

// Operations
pub use crate::{composite_image, resize_image};
pub use crate::{decode_animation, decode_gif, decode_png, detect_format};
pub use crate::{encode_apng, encode_apng_with, encode_gif, encode_gif_with};
