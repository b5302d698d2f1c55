//! GIF encoder implementation.

use rasterkit_core::{lzw, AnimatedImage, Error, Result};
use tracing::debug;

use super::quantize::{Palette, ALPHA_THRESHOLD};
use super::{
    interlaced_rows, DisposalMethod, LoopCount, APPLICATION_LABEL, EXTENSION_INTRODUCER,
    GIF89A_SIGNATURE, GRAPHIC_CONTROL_LABEL, IMAGE_SEPARATOR, MAX_DIMENSION, TRAILER,
};

/// GIF encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GifConfig {
    /// Loop count written to the NETSCAPE2.0 extension.
    pub loop_count: LoopCount,
    /// Disposal method written for every frame.
    pub disposal: DisposalMethod,
    /// Maximum colors per palette (2-256).
    pub max_colors: u16,
    /// Write interlaced image data.
    pub interlace: bool,
}

impl Default for GifConfig {
    fn default() -> Self {
        Self {
            loop_count: LoopCount::Infinite,
            disposal: DisposalMethod::None,
            max_colors: 256,
            interlace: false,
        }
    }
}

/// GIF encoder.
#[derive(Debug, Clone, Default)]
pub struct GifEncoder {
    config: GifConfig,
}

/// Palette layout chosen for a whole animation.
enum PaletteMode {
    Global(Palette),
    Local,
}

impl GifEncoder {
    /// Create a new GIF encoder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new GIF encoder with custom configuration.
    pub fn with_config(mut config: GifConfig) -> Self {
        config.max_colors = config.max_colors.clamp(2, 256);
        Self { config }
    }

    /// Set loop count.
    pub fn loop_count(mut self, count: LoopCount) -> Self {
        self.config.loop_count = count;
        self
    }

    /// Set the disposal method written for each frame.
    pub fn disposal(mut self, disposal: DisposalMethod) -> Self {
        self.config.disposal = disposal;
        self
    }

    /// Set maximum colors.
    pub fn max_colors(mut self, colors: u16) -> Self {
        self.config.max_colors = colors.clamp(2, 256);
        self
    }

    /// Enable/disable interlacing.
    pub fn interlace(mut self, enable: bool) -> Self {
        self.config.interlace = enable;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &GifConfig {
        &self.config
    }

    /// Encode frames as an animated GIF.
    ///
    /// Each frame is written at its own offset and size; the canvas is the
    /// bounding box of all frames.
    pub fn encode(&self, frames: &[AnimatedImage]) -> Result<Vec<u8>> {
        let (width, height) = canvas_size(frames)?;
        let max_colors = self.config.max_colors.clamp(2, 256) as usize;

        let mode = match Palette::exact(frames.iter().map(AnimatedImage::data), max_colors) {
            Some(palette) => PaletteMode::Global(palette),
            None => PaletteMode::Local,
        };

        let mut output = Vec::new();
        output.extend_from_slice(GIF89A_SIGNATURE);
        output.extend_from_slice(&width.to_le_bytes());
        output.extend_from_slice(&height.to_le_bytes());

        match &mode {
            PaletteMode::Global(palette) => {
                let size = palette_size_flag(palette.colors().len());
                output.push(0x80 | (size << 4) | size);
                output.push(0); // Background color index
                output.push(0); // Pixel aspect ratio
                write_color_table(&mut output, palette.colors(), size);
            }
            PaletteMode::Local => {
                output.push(0x70);
                output.push(0);
                output.push(0);
            }
        }

        write_netscape_extension(&mut output, self.config.loop_count.to_netscape());

        let mut global = match mode {
            PaletteMode::Global(palette) => Some(palette),
            PaletteMode::Local => None,
        };

        for (index, frame) in frames.iter().enumerate() {
            let mut local = match global {
                Some(_) => None,
                None => Some(
                    Palette::exact([frame.data()], max_colors)
                        .unwrap_or_else(|| Palette::median_cut(frame.data(), max_colors)),
                ),
            };
            let Some(palette) = local.as_mut().or(global.as_mut()) else {
                return Err(Error::corrupt("GIF frame has no palette"));
            };

            let indices = palette.index_pixels(frame.data());
            let uses_transparency = frame
                .data()
                .chunks_exact(4)
                .any(|px| px[3] < ALPHA_THRESHOLD);
            let transparent = palette.transparent_index().filter(|_| uses_transparency);
            let colors = palette.colors().len();

            write_graphic_control(
                &mut output,
                self.config.disposal,
                frame.delay.min(u16::MAX as u32) as u16,
                transparent,
            );
            write_image_descriptor(
                &mut output,
                frame,
                local.as_ref().map(|p| palette_size_flag(p.colors().len())),
                self.config.interlace,
            );
            if let Some(palette) = &local {
                write_color_table(
                    &mut output,
                    palette.colors(),
                    palette_size_flag(palette.colors().len()),
                );
            }

            let ordered = if self.config.interlace {
                interlace(&indices, frame.width() as usize, frame.height() as usize)
            } else {
                indices
            };
            let min_code_size = lzw::min_code_size_for(colors);
            let compressed = lzw::compress(&ordered, min_code_size)?;
            output.push(min_code_size);
            write_sub_blocks(&mut output, &compressed);

            debug!(
                index,
                x = frame.x,
                y = frame.y,
                width = frame.width(),
                height = frame.height(),
                colors,
                local_palette = local.is_some(),
                "encoded GIF frame"
            );
        }

        output.push(TRAILER);
        Ok(output)
    }
}

/// Bounding box of all frames, validated against GIF's 16-bit coordinates.
fn canvas_size(frames: &[AnimatedImage]) -> Result<(u16, u16)> {
    if frames.is_empty() {
        return Err(Error::dimensions("no frames to encode"));
    }
    let mut width = 0u64;
    let mut height = 0u64;
    for (index, frame) in frames.iter().enumerate() {
        if frame.right() > MAX_DIMENSION || frame.bottom() > MAX_DIMENSION {
            return Err(Error::dimensions(format!(
                "frame {} extends to {}x{}, beyond the GIF limit of {}",
                index,
                frame.right(),
                frame.bottom(),
                MAX_DIMENSION
            )));
        }
        width = width.max(frame.right());
        height = height.max(frame.bottom());
    }
    Ok((width as u16, height as u16))
}

/// Size field for a color table holding `len` entries.
fn palette_size_flag(len: usize) -> u8 {
    let mut size = 0u8;
    let mut n = 2;
    while n < len && size < 7 {
        size += 1;
        n <<= 1;
    }
    size
}

/// Write a color table padded to `2^(size_flag + 1)` entries.
fn write_color_table(output: &mut Vec<u8>, palette: &[[u8; 3]], size_flag: u8) {
    let table_size = 1usize << (size_flag + 1);
    for color in palette.iter().take(table_size) {
        output.extend_from_slice(color);
    }
    for _ in palette.len()..table_size {
        output.extend_from_slice(&[0, 0, 0]);
    }
}

fn write_netscape_extension(output: &mut Vec<u8>, loop_count: u16) {
    output.push(EXTENSION_INTRODUCER);
    output.push(APPLICATION_LABEL);
    output.push(11);
    output.extend_from_slice(b"NETSCAPE2.0");
    output.push(3);
    output.push(1);
    output.extend_from_slice(&loop_count.to_le_bytes());
    output.push(0);
}

fn write_graphic_control(
    output: &mut Vec<u8>,
    disposal: DisposalMethod,
    delay: u16,
    transparent: Option<u8>,
) {
    output.push(EXTENSION_INTRODUCER);
    output.push(GRAPHIC_CONTROL_LABEL);
    output.push(4);
    let mut flags = disposal.code() << 2;
    if transparent.is_some() {
        flags |= 0x01;
    }
    output.push(flags);
    output.extend_from_slice(&delay.to_le_bytes());
    output.push(transparent.unwrap_or(0));
    output.push(0);
}

fn write_image_descriptor(
    output: &mut Vec<u8>,
    frame: &AnimatedImage,
    local_size: Option<u8>,
    interlace: bool,
) {
    // Offsets and sizes were checked against MAX_DIMENSION.
    output.push(IMAGE_SEPARATOR);
    output.extend_from_slice(&(frame.x as u16).to_le_bytes());
    output.extend_from_slice(&(frame.y as u16).to_le_bytes());
    output.extend_from_slice(&(frame.width() as u16).to_le_bytes());
    output.extend_from_slice(&(frame.height() as u16).to_le_bytes());

    let mut flags = 0u8;
    if let Some(size) = local_size {
        flags |= 0x80 | size;
    }
    if interlace {
        flags |= 0x40;
    }
    output.push(flags);
}

/// Write data as sub-blocks of at most 255 bytes plus a terminator.
fn write_sub_blocks(output: &mut Vec<u8>, data: &[u8]) {
    for chunk in data.chunks(255) {
        output.push(chunk.len() as u8);
        output.extend_from_slice(chunk);
    }
    output.push(0);
}

/// Reorder rows into the four-pass interlaced layout.
fn interlace(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len());
    for y in interlaced_rows(height) {
        output.extend_from_slice(&data[y * width..(y + 1) * width]);
    }
    output
}
