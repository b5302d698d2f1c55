//! PNG and APNG codec.
//!
//! This module provides:
//! - Decoding of every standard colour type and bit depth to RGBA8
//! - Adam7 interlaced images
//! - APNG animation (`acTL`/`fcTL`/`fdAT`) with dispose and blend ops
//! - Lossless APNG encoding, palette-packed when the colours allow it

mod decoder;
mod encoder;
mod filter;

pub use decoder::{PngDecoder, PngInfo};
pub use encoder::{ApngConfig, ApngEncoder};
pub use filter::{FilterStrategy, FilterType};
pub use rasterkit_core::CompressionLevel;

use byteorder::{BigEndian, ByteOrder};
use rasterkit_core::checksum::Crc32;
use rasterkit_core::{AnimatedImage, Error, Result};

use crate::canvas::{Blend, Disposal, Rect};

/// PNG signature bytes.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Largest width or height PNG allows.
pub const MAX_DIMENSION: u64 = i32::MAX as u64;

/// PNG color type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorType {
    /// Grayscale.
    Grayscale = 0,
    /// RGB.
    Rgb = 2,
    /// Indexed color.
    Indexed = 3,
    /// Grayscale with alpha.
    GrayscaleAlpha = 4,
    /// RGBA.
    Rgba = 6,
}

impl ColorType {
    /// Create color type from value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ColorType::Grayscale),
            2 => Some(ColorType::Rgb),
            3 => Some(ColorType::Indexed),
            4 => Some(ColorType::GrayscaleAlpha),
            6 => Some(ColorType::Rgba),
            _ => None,
        }
    }

    /// Samples per pixel.
    pub fn channels(&self) -> u8 {
        match self {
            ColorType::Grayscale => 1,
            ColorType::Rgb => 3,
            ColorType::Indexed => 1,
            ColorType::GrayscaleAlpha => 2,
            ColorType::Rgba => 4,
        }
    }

    /// Check if color type has alpha.
    pub fn has_alpha(&self) -> bool {
        matches!(self, ColorType::GrayscaleAlpha | ColorType::Rgba)
    }

    /// Whether `bit_depth` is legal for this color type.
    pub fn allows_bit_depth(&self, bit_depth: u8) -> bool {
        match self {
            ColorType::Grayscale => matches!(bit_depth, 1 | 2 | 4 | 8 | 16),
            ColorType::Indexed => matches!(bit_depth, 1 | 2 | 4 | 8),
            ColorType::Rgb | ColorType::GrayscaleAlpha | ColorType::Rgba => {
                matches!(bit_depth, 8 | 16)
            }
        }
    }
}

/// PNG interlace method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterlaceMethod {
    /// No interlacing.
    None = 0,
    /// Adam7 interlacing.
    Adam7 = 1,
}

impl InterlaceMethod {
    /// Create from value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(InterlaceMethod::None),
            1 => Some(InterlaceMethod::Adam7),
            _ => None,
        }
    }
}

/// PNG chunk type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType([u8; 4]);

impl ChunkType {
    /// IHDR - Image header.
    pub const IHDR: Self = Self(*b"IHDR");
    /// PLTE - Palette.
    pub const PLTE: Self = Self(*b"PLTE");
    /// IDAT - Image data.
    pub const IDAT: Self = Self(*b"IDAT");
    /// IEND - Image end.
    pub const IEND: Self = Self(*b"IEND");
    /// tRNS - Transparency.
    pub const TRNS: Self = Self(*b"tRNS");
    /// acTL - Animation control.
    pub const ACTL: Self = Self(*b"acTL");
    /// fcTL - Frame control.
    pub const FCTL: Self = Self(*b"fcTL");
    /// fdAT - Frame data.
    pub const FDAT: Self = Self(*b"fdAT");
    /// tEXt - Textual data.
    pub const TEXT: Self = Self(*b"tEXt");

    /// Create from bytes.
    pub fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Check if chunk is critical.
    pub fn is_critical(&self) -> bool {
        (self.0[0] & 0x20) == 0
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// APNG `dispose_op`: what happens to a frame's region before the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DisposeOp {
    /// Leave the canvas as is.
    #[default]
    None = 0,
    /// Clear the region to transparent black.
    Background = 1,
    /// Revert the region to its previous contents.
    Previous = 2,
}

impl DisposeOp {
    /// Create from value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DisposeOp::None),
            1 => Some(DisposeOp::Background),
            2 => Some(DisposeOp::Previous),
            _ => None,
        }
    }

    /// The canvas operation this op asks for.
    pub fn to_disposal(self) -> Disposal {
        match self {
            DisposeOp::None => Disposal::None,
            DisposeOp::Background => Disposal::Background,
            DisposeOp::Previous => Disposal::Previous,
        }
    }
}

/// APNG `blend_op`: how a frame combines with the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendOp {
    /// Overwrite the region.
    #[default]
    Source = 0,
    /// Alpha-composite over the region.
    Over = 1,
}

impl BlendOp {
    /// Create from value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(BlendOp::Source),
            1 => Some(BlendOp::Over),
            _ => None,
        }
    }

    /// The canvas blend mode.
    pub fn to_blend(self) -> Blend {
        match self {
            BlendOp::Source => Blend::Source,
            BlendOp::Over => Blend::Over,
        }
    }
}

/// Contents of an `acTL` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationControl {
    /// Number of frames in the animation.
    pub num_frames: u32,
    /// Number of plays, 0 for infinite.
    pub num_plays: u32,
}

impl AnimationControl {
    /// Parse an `acTL` body.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != 8 {
            return Err(Error::corrupt(format!("acTL length {} (expected 8)", data.len())));
        }
        Ok(Self {
            num_frames: BigEndian::read_u32(&data[0..4]),
            num_plays: BigEndian::read_u32(&data[4..8]),
        })
    }

    /// Serialize to an `acTL` body.
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        BigEndian::write_u32(&mut out[0..4], self.num_frames);
        BigEndian::write_u32(&mut out[4..8], self.num_plays);
        out
    }
}

/// Contents of an `fcTL` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameControl {
    /// Position in the shared `fcTL`/`fdAT` sequence.
    pub sequence_number: u32,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Left edge on the canvas.
    pub x_offset: u32,
    /// Top edge on the canvas.
    pub y_offset: u32,
    /// Delay numerator.
    pub delay_num: u16,
    /// Delay denominator (0 means 100).
    pub delay_den: u16,
    /// Disposal after the frame is shown.
    pub dispose_op: DisposeOp,
    /// Blending onto the canvas.
    pub blend_op: BlendOp,
}

impl FrameControl {
    /// Parse an `fcTL` body.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != 26 {
            return Err(Error::corrupt(format!("fcTL length {} (expected 26)", data.len())));
        }
        let dispose_op = DisposeOp::from_u8(data[24])
            .ok_or_else(|| Error::corrupt(format!("invalid dispose_op {}", data[24])))?;
        let blend_op = BlendOp::from_u8(data[25])
            .ok_or_else(|| Error::corrupt(format!("invalid blend_op {}", data[25])))?;
        Ok(Self {
            sequence_number: BigEndian::read_u32(&data[0..4]),
            width: BigEndian::read_u32(&data[4..8]),
            height: BigEndian::read_u32(&data[8..12]),
            x_offset: BigEndian::read_u32(&data[12..16]),
            y_offset: BigEndian::read_u32(&data[16..20]),
            delay_num: BigEndian::read_u16(&data[20..22]),
            delay_den: BigEndian::read_u16(&data[22..24]),
            dispose_op,
            blend_op,
        })
    }

    /// Serialize to an `fcTL` body.
    pub fn to_bytes(&self) -> [u8; 26] {
        let mut out = [0u8; 26];
        BigEndian::write_u32(&mut out[0..4], self.sequence_number);
        BigEndian::write_u32(&mut out[4..8], self.width);
        BigEndian::write_u32(&mut out[8..12], self.height);
        BigEndian::write_u32(&mut out[12..16], self.x_offset);
        BigEndian::write_u32(&mut out[16..20], self.y_offset);
        BigEndian::write_u16(&mut out[20..22], self.delay_num);
        BigEndian::write_u16(&mut out[22..24], self.delay_den);
        out[24] = self.dispose_op as u8;
        out[25] = self.blend_op as u8;
        out
    }

    /// Frame rectangle on the canvas.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x_offset, self.y_offset, self.width, self.height)
    }

    /// Delay in hundredths of a second, rounded half up.
    pub fn delay_centis(&self) -> u32 {
        let den = if self.delay_den == 0 { 100 } else { self.delay_den as u32 };
        (self.delay_num as u32 * 100 + den / 2) / den
    }
}

/// Adam7 pass parameters: (start_x, start_y, step_x, step_y).
pub const ADAM7_PASSES: [(usize, usize, usize, usize); 7] = [
    (0, 0, 8, 8),
    (4, 0, 8, 8),
    (0, 4, 4, 8),
    (2, 0, 4, 4),
    (0, 2, 2, 4),
    (1, 0, 2, 2),
    (0, 1, 1, 2),
];

/// Size of an Adam7 pass for a `width` x `height` image.
pub(crate) fn adam7_pass_size(pass: usize, width: usize, height: usize) -> (usize, usize) {
    let (start_x, start_y, step_x, step_y) = ADAM7_PASSES[pass];
    let pass_width = (width + step_x - 1 - start_x) / step_x;
    let pass_height = (height + step_y - 1 - start_y) / step_y;
    (pass_width, pass_height)
}

/// CRC of a chunk's type and data.
pub(crate) fn chunk_crc(chunk_type: ChunkType, data: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(chunk_type.as_bytes());
    crc.update(data);
    crc.finish()
}

/// Append a complete chunk (length, type, data, CRC).
pub(crate) fn write_chunk(output: &mut Vec<u8>, chunk_type: ChunkType, data: &[u8]) {
    let mut word = [0u8; 4];
    BigEndian::write_u32(&mut word, data.len() as u32);
    output.extend_from_slice(&word);
    output.extend_from_slice(chunk_type.as_bytes());
    output.extend_from_slice(data);
    BigEndian::write_u32(&mut word, chunk_crc(chunk_type, data));
    output.extend_from_slice(&word);
}

/// Decode every frame of a PNG or APNG.
pub fn decode_png(data: &[u8]) -> Result<Vec<AnimatedImage>> {
    PngDecoder::new().decode(data)
}

/// Encode frames as an APNG with default settings.
pub fn encode_apng(frames: &[AnimatedImage]) -> Result<Vec<u8>> {
    ApngEncoder::new().encode(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_type() {
        assert_eq!(ColorType::from_u8(0), Some(ColorType::Grayscale));
        assert_eq!(ColorType::from_u8(6), Some(ColorType::Rgba));
        assert_eq!(ColorType::from_u8(1), None);
        assert_eq!(ColorType::Rgba.channels(), 4);
        assert!(ColorType::Rgba.has_alpha());
        assert!(!ColorType::Rgb.has_alpha());
    }

    #[test]
    fn test_bit_depths() {
        assert!(ColorType::Grayscale.allows_bit_depth(1));
        assert!(ColorType::Indexed.allows_bit_depth(4));
        assert!(!ColorType::Indexed.allows_bit_depth(16));
        assert!(!ColorType::Rgb.allows_bit_depth(4));
        assert!(ColorType::Rgba.allows_bit_depth(16));
    }

    #[test]
    fn test_chunk_type() {
        assert!(ChunkType::IHDR.is_critical());
        assert!(ChunkType::IDAT.is_critical());
        assert!(!ChunkType::TEXT.is_critical());
        assert!(!ChunkType::ACTL.is_critical());
        assert_eq!(format!("{}", ChunkType::FDAT), "fdAT");
    }

    #[test]
    fn test_chunk_crc() {
        assert_eq!(chunk_crc(ChunkType::IEND, &[]), 0xAE42_6082);
        let mut out = Vec::new();
        write_chunk(&mut out, ChunkType::IEND, &[]);
        assert_eq!(out, [0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82]);
    }

    #[test]
    fn test_frame_control_bytes() {
        let fctl = FrameControl {
            sequence_number: 3,
            width: 10,
            height: 20,
            x_offset: 1,
            y_offset: 2,
            delay_num: 1,
            delay_den: 10,
            dispose_op: DisposeOp::Previous,
            blend_op: BlendOp::Over,
        };
        let bytes = fctl.to_bytes();
        assert_eq!(&bytes[0..4], &[0, 0, 0, 3]);
        assert_eq!(bytes[24], 2);
        assert_eq!(bytes[25], 1);
        assert_eq!(FrameControl::parse(&bytes).unwrap(), fctl);
        assert!(FrameControl::parse(&bytes[..25]).is_err());
    }

    #[test]
    fn test_frame_control_rejects_bad_ops() {
        let mut bytes = [0u8; 26];
        bytes[24] = 3;
        assert!(FrameControl::parse(&bytes).is_err());
        bytes[24] = 0;
        bytes[25] = 2;
        assert!(FrameControl::parse(&bytes).is_err());
    }

    #[test]
    fn test_delay_centis() {
        let mut fctl = FrameControl::parse(&[0u8; 26]).unwrap();
        fctl.delay_num = 1;
        fctl.delay_den = 10;
        assert_eq!(fctl.delay_centis(), 10);
        fctl.delay_num = 20;
        fctl.delay_den = 1000;
        assert_eq!(fctl.delay_centis(), 2);
        fctl.delay_num = 1;
        fctl.delay_den = 3;
        assert_eq!(fctl.delay_centis(), 33);
        fctl.delay_num = 7;
        fctl.delay_den = 0;
        assert_eq!(fctl.delay_centis(), 7);
        fctl.delay_num = 5;
        fctl.delay_den = 1000;
        assert_eq!(fctl.delay_centis(), 1);
    }

    #[test]
    fn test_animation_control_bytes() {
        let actl = AnimationControl {
            num_frames: 2,
            num_plays: 0,
        };
        assert_eq!(AnimationControl::parse(&actl.to_bytes()).unwrap(), actl);
        assert!(AnimationControl::parse(&[0; 7]).is_err());
    }

    #[test]
    fn test_adam7_pass_size() {
        assert_eq!(adam7_pass_size(0, 8, 8), (1, 1));
        assert_eq!(adam7_pass_size(6, 8, 8), (8, 4));
        assert_eq!(adam7_pass_size(1, 4, 4), (0, 1));
        assert_eq!(adam7_pass_size(5, 1, 1), (0, 1));
        let total: usize = (0..7)
            .map(|p| {
                let (w, h) = adam7_pass_size(p, 13, 7);
                w * h
            })
            .sum();
        assert_eq!(total, 13 * 7);
    }

    #[test]
    fn test_dispose_and_blend_mapping() {
        assert_eq!(DisposeOp::Background.to_disposal(), Disposal::Background);
        assert_eq!(BlendOp::Over.to_blend(), Blend::Over);
        assert_eq!(DisposeOp::from_u8(2), Some(DisposeOp::Previous));
        assert_eq!(BlendOp::from_u8(9), None);
    }
}
