//! APNG encoder implementation.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};
use rasterkit_core::deflate::zlib_compress;
use rasterkit_core::image::CHANNELS;
use rasterkit_core::{AnimatedImage, CompressionLevel, Error, Result, Rgba};
use tracing::debug;

use super::filter::{filter_scanlines, FilterStrategy};
use super::{
    write_chunk, AnimationControl, BlendOp, ChunkType, ColorType, DisposeOp, FrameControl,
    MAX_DIMENSION, PNG_SIGNATURE,
};

/// Largest payload written per `IDAT`/`fdAT` chunk.
const MAX_CHUNK_SIZE: usize = 8192;

/// APNG encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApngConfig {
    /// Compression level.
    pub compression: CompressionLevel,
    /// Filter selection strategy.
    pub filter: FilterStrategy,
    /// Number of plays, 0 for infinite.
    pub loop_count: u32,
    /// Dispose op written for every frame.
    pub dispose: DisposeOp,
    /// Write an indexed image when at most 256 colours are used.
    pub palette: bool,
}

impl Default for ApngConfig {
    fn default() -> Self {
        Self {
            compression: CompressionLevel::Default,
            filter: FilterStrategy::Adaptive,
            loop_count: 0,
            dispose: DisposeOp::None,
            palette: true,
        }
    }
}

/// Colour model chosen for the whole file.
enum PixelModel {
    Rgba,
    Indexed {
        colors: Vec<Rgba>,
        lookup: HashMap<Rgba, u8>,
        bit_depth: u8,
    },
}

impl PixelModel {
    /// Indexed when every pixel fits a 256-entry palette.
    fn choose<'a>(images: impl IntoIterator<Item = &'a [u8]>, extra: Option<Rgba>) -> Self {
        let mut colors = Vec::new();
        let mut lookup = HashMap::new();
        let all = images
            .into_iter()
            .flat_map(|data| data.chunks_exact(CHANNELS))
            .map(|px| [px[0], px[1], px[2], px[3]])
            .chain(extra);
        for px in all {
            if !lookup.contains_key(&px) {
                if colors.len() == 256 {
                    return PixelModel::Rgba;
                }
                lookup.insert(px, colors.len() as u8);
                colors.push(px);
            }
        }
        let bit_depth = match colors.len() {
            0..=2 => 1,
            3..=4 => 2,
            5..=16 => 4,
            _ => 8,
        };
        PixelModel::Indexed {
            colors,
            lookup,
            bit_depth,
        }
    }

    fn color_type(&self) -> ColorType {
        match self {
            PixelModel::Rgba => ColorType::Rgba,
            PixelModel::Indexed { .. } => ColorType::Indexed,
        }
    }

    fn bit_depth(&self) -> u8 {
        match self {
            PixelModel::Rgba => 8,
            PixelModel::Indexed { bit_depth, .. } => *bit_depth,
        }
    }

    /// Raw scanlines for a `width`-pixel-wide RGBA buffer.
    fn scanlines(&self, data: &[u8], width: usize) -> (Vec<u8>, usize) {
        match self {
            PixelModel::Rgba => (data.to_vec(), width * CHANNELS),
            PixelModel::Indexed {
                lookup, bit_depth, ..
            } => {
                let depth = *bit_depth as usize;
                let row_bytes = (width * depth).div_ceil(8);
                let mut out = Vec::with_capacity(row_bytes * data.len() / (width * CHANNELS).max(1));
                for row in data.chunks_exact(width * CHANNELS) {
                    let start = out.len();
                    out.resize(start + row_bytes, 0);
                    for (x, px) in row.chunks_exact(CHANNELS).enumerate() {
                        let index = lookup.get(&[px[0], px[1], px[2], px[3]]).copied().unwrap_or(0);
                        let bit = x * depth;
                        out[start + bit / 8] |= index << (8 - depth - bit % 8);
                    }
                }
                (out, row_bytes)
            }
        }
    }
}

/// APNG encoder.
#[derive(Debug, Clone, Default)]
pub struct ApngEncoder {
    config: ApngConfig,
}

impl ApngEncoder {
    /// Create a new APNG encoder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create encoder with configuration.
    pub fn with_config(config: ApngConfig) -> Self {
        Self { config }
    }

    /// Set compression level.
    pub fn compression(mut self, level: CompressionLevel) -> Self {
        self.config.compression = level;
        self
    }

    /// Set filter strategy.
    pub fn filter(mut self, filter: FilterStrategy) -> Self {
        self.config.filter = filter;
        self
    }

    /// Set number of plays (0 = infinite).
    pub fn loop_count(mut self, plays: u32) -> Self {
        self.config.loop_count = plays;
        self
    }

    /// Set the dispose op for every frame.
    pub fn dispose(mut self, dispose: DisposeOp) -> Self {
        self.config.dispose = dispose;
        self
    }

    /// Enable/disable palette output.
    pub fn palette(mut self, enable: bool) -> Self {
        self.config.palette = enable;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &ApngConfig {
        &self.config
    }

    /// Encode frames as an APNG.
    ///
    /// The canvas is the bounding box of all frames. When the first frame
    /// covers the whole canvas it doubles as the default image; otherwise
    /// it is rendered onto a transparent canvas and written as a default
    /// image outside the animation.
    pub fn encode(&self, frames: &[AnimatedImage]) -> Result<Vec<u8>> {
        let (width, height) = canvas_size(frames)?;
        let first = &frames[0];
        let default_in_animation =
            first.x == 0 && first.y == 0 && first.width() == width && first.height() == height;

        let model = if self.config.palette {
            let extra = (!default_in_animation).then_some([0, 0, 0, 0]);
            PixelModel::choose(frames.iter().map(AnimatedImage::data), extra)
        } else {
            PixelModel::Rgba
        };

        let mut output = Vec::new();
        output.extend_from_slice(&PNG_SIGNATURE);
        write_ihdr(&mut output, width, height, &model);

        if let PixelModel::Indexed { colors, .. } = &model {
            let plte: Vec<u8> = colors.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
            write_chunk(&mut output, ChunkType::PLTE, &plte);
            if let Some(last) = colors.iter().rposition(|c| c[3] != 255) {
                let trns: Vec<u8> = colors[..=last].iter().map(|c| c[3]).collect();
                write_chunk(&mut output, ChunkType::TRNS, &trns);
            }
        }

        let actl = AnimationControl {
            num_frames: frames.len() as u32,
            num_plays: self.config.loop_count,
        };
        write_chunk(&mut output, ChunkType::ACTL, &actl.to_bytes());

        if !default_in_animation {
            let mut canvas = vec![0u8; width as usize * height as usize * CHANNELS];
            let stride = width as usize * CHANNELS;
            let x = first.x as usize * CHANNELS;
            for (row, src) in first.image().rows().enumerate() {
                let start = (first.y as usize + row) * stride + x;
                canvas[start..start + src.len()].copy_from_slice(src);
            }
            let compressed = self.compress(&model, &canvas, width as usize);
            for piece in compressed.chunks(MAX_CHUNK_SIZE) {
                write_chunk(&mut output, ChunkType::IDAT, piece);
            }
        }

        let mut sequence = 0u32;
        for (index, frame) in frames.iter().enumerate() {
            let fctl = FrameControl {
                sequence_number: sequence,
                width: frame.width(),
                height: frame.height(),
                x_offset: frame.x,
                y_offset: frame.y,
                delay_num: frame.delay.min(u16::MAX as u32) as u16,
                delay_den: 100,
                dispose_op: self.config.dispose,
                blend_op: BlendOp::Source,
            };
            write_chunk(&mut output, ChunkType::FCTL, &fctl.to_bytes());
            sequence += 1;

            let compressed = self.compress(&model, frame.data(), frame.width() as usize);
            if index == 0 && default_in_animation {
                for piece in compressed.chunks(MAX_CHUNK_SIZE) {
                    write_chunk(&mut output, ChunkType::IDAT, piece);
                }
            } else {
                for piece in compressed.chunks(MAX_CHUNK_SIZE) {
                    let mut fdat = Vec::with_capacity(4 + piece.len());
                    let mut word = [0u8; 4];
                    BigEndian::write_u32(&mut word, sequence);
                    fdat.extend_from_slice(&word);
                    fdat.extend_from_slice(piece);
                    write_chunk(&mut output, ChunkType::FDAT, &fdat);
                    sequence += 1;
                }
            }

            debug!(
                index,
                x = frame.x,
                y = frame.y,
                width = frame.width(),
                height = frame.height(),
                delay = frame.delay,
                bytes = compressed.len(),
                "encoded APNG frame"
            );
        }

        write_chunk(&mut output, ChunkType::IEND, &[]);
        Ok(output)
    }

    /// Filter and zlib-compress one RGBA buffer.
    fn compress(&self, model: &PixelModel, data: &[u8], width: usize) -> Vec<u8> {
        let (raw, row_bytes) = model.scanlines(data, width);
        let (bpp, strategy) = match model {
            PixelModel::Rgba => (CHANNELS, self.config.filter),
            // Indexed data predicts poorly; fixed strategies are still honoured.
            PixelModel::Indexed { .. } => match self.config.filter {
                FilterStrategy::Adaptive => (1, FilterStrategy::None),
                fixed => (1, fixed),
            },
        };
        let filtered = filter_scanlines(&raw, row_bytes, bpp, strategy);
        zlib_compress(&filtered, self.config.compression)
    }
}

/// Bounding box of all frames, validated against PNG's 31-bit limit.
fn canvas_size(frames: &[AnimatedImage]) -> Result<(u32, u32)> {
    if frames.is_empty() {
        return Err(Error::dimensions("no frames to encode"));
    }
    let width = frames.iter().map(AnimatedImage::right).max().unwrap_or(0);
    let height = frames.iter().map(AnimatedImage::bottom).max().unwrap_or(0);
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::dimensions(format!(
            "canvas {}x{} exceeds the PNG limit of {}",
            width, height, MAX_DIMENSION
        )));
    }
    Ok((width as u32, height as u32))
}

fn write_ihdr(output: &mut Vec<u8>, width: u32, height: u32, model: &PixelModel) {
    let mut data = [0u8; 13];
    BigEndian::write_u32(&mut data[0..4], width);
    BigEndian::write_u32(&mut data[4..8], height);
    data[8] = model.bit_depth();
    data[9] = model.color_type() as u8;
    // Compression, filter and interlace methods stay 0.
    write_chunk(output, ChunkType::IHDR, &data);
}
