//! # rasterkit core
//!
//! Core types and bit-level primitives shared by the rasterkit codecs.
//!
//! This crate provides:
//! - Error handling types
//! - The RGBA [`Image`] buffer and [`AnimatedImage`] frame
//! - Straight-alpha pixel blending
//! - LSB-first bit reading/writing
//! - CRC-32 and Adler-32
//! - GIF-flavoured LZW and zlib/DEFLATE compression

pub mod bitstream;
pub mod checksum;
pub mod deflate;
pub mod error;
pub mod image;
pub mod lzw;
pub mod pixel;

pub use deflate::CompressionLevel;
pub use error::{Error, Result};
pub use image::{AnimatedImage, Image, Rgba};
