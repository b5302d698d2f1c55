//! GIF image codec.
//!
//! Decodes GIF87a/GIF89a streams into fully composited RGBA frames and
//! encodes frame sequences as animated GIF89a.
//!
//! ## Features
//!
//! - LZW decompression/compression
//! - Frame delays and NETSCAPE2.0 loop count
//! - Transparency
//! - Interlaced images
//! - Local and global color tables
//! - Disposal methods (keep, restore to background, restore to previous)

mod decoder;
mod encoder;
mod quantize;

pub use decoder::GifDecoder;
pub use encoder::{GifConfig, GifEncoder};

use rasterkit_core::{AnimatedImage, Result};

use crate::canvas::Disposal;

/// GIF frame disposal method, as stored in the Graphic Control Extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DisposalMethod {
    /// No disposal specified.
    #[default]
    None,
    /// Do not dispose.
    Keep,
    /// Restore to background color.
    RestoreBackground,
    /// Restore to previous frame.
    RestorePrevious,
}

impl DisposalMethod {
    /// Parse disposal method from the GCE packed field.
    pub fn from_packed(packed: u8) -> Self {
        match (packed >> 2) & 0x07 {
            1 => DisposalMethod::Keep,
            2 => DisposalMethod::RestoreBackground,
            3 => DisposalMethod::RestorePrevious,
            // 0 and the reserved values 4..=7
            _ => DisposalMethod::None,
        }
    }

    /// The 3-bit disposal code.
    pub fn code(self) -> u8 {
        match self {
            DisposalMethod::None => 0,
            DisposalMethod::Keep => 1,
            DisposalMethod::RestoreBackground => 2,
            DisposalMethod::RestorePrevious => 3,
        }
    }

    /// The canvas operation this method asks for.
    pub fn to_disposal(self) -> Disposal {
        match self {
            DisposalMethod::None | DisposalMethod::Keep => Disposal::None,
            DisposalMethod::RestoreBackground => Disposal::Background,
            DisposalMethod::RestorePrevious => Disposal::Previous,
        }
    }
}

/// How many times an animation plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoopCount {
    /// Loop forever.
    #[default]
    Infinite,
    /// Repeat this many extra times.
    Finite(u16),
}

impl LoopCount {
    /// Value for the NETSCAPE2.0 extension (0 means forever).
    pub fn to_netscape(self) -> u16 {
        match self {
            LoopCount::Infinite => 0,
            LoopCount::Finite(n) => n,
        }
    }

    /// Interpret a NETSCAPE2.0 loop value.
    pub fn from_netscape(value: u16) -> Self {
        match value {
            0 => LoopCount::Infinite,
            n => LoopCount::Finite(n),
        }
    }
}

/// GIF logical screen descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenDescriptor {
    /// Canvas width.
    pub width: u16,
    /// Canvas height.
    pub height: u16,
    /// Has global color table.
    pub has_global_color_table: bool,
    /// Color resolution (bits per primary color).
    pub color_resolution: u8,
    /// Global color table is sorted.
    pub sorted: bool,
    /// Size field of the global color table (2^(n+1) entries).
    pub global_color_table_size: u8,
    /// Background color index.
    pub background_color_index: u8,
    /// Pixel aspect ratio.
    pub pixel_aspect_ratio: u8,
}

/// GIF87a file signature.
pub const GIF87A_SIGNATURE: &[u8; 6] = b"GIF87a";
/// GIF89a file signature.
pub const GIF89A_SIGNATURE: &[u8; 6] = b"GIF89a";

/// Extension introducer byte.
pub const EXTENSION_INTRODUCER: u8 = 0x21;
/// Image separator byte.
pub const IMAGE_SEPARATOR: u8 = 0x2C;
/// GIF trailer byte.
pub const TRAILER: u8 = 0x3B;

/// Graphic control extension label.
pub const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
/// Comment extension label.
pub const COMMENT_LABEL: u8 = 0xFE;
/// Application extension label.
pub const APPLICATION_LABEL: u8 = 0xFF;
/// Plain text extension label.
pub const PLAIN_TEXT_LABEL: u8 = 0x01;

/// Largest canvas coordinate a GIF can express.
pub const MAX_DIMENSION: u64 = u16::MAX as u64;

/// Decode every frame of a GIF.
pub fn decode_gif(data: &[u8]) -> Result<Vec<AnimatedImage>> {
    GifDecoder::new().decode(data)
}

/// Encode frames as an animated GIF with default settings.
pub fn encode_gif(frames: &[AnimatedImage]) -> Result<Vec<u8>> {
    GifEncoder::new().encode(frames)
}

/// Source row order of an interlaced image: entry `i` is the canvas row
/// of the `i`-th stored row.
pub(crate) fn interlaced_rows(height: usize) -> Vec<usize> {
    const PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];
    PASSES
        .iter()
        .flat_map(|&(start, step)| (start..height).step_by(step))
        .collect()
}
