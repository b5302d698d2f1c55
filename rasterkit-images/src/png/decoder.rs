//! PNG and APNG decoder implementation.

use byteorder::{BigEndian, ByteOrder};
use rasterkit_core::deflate::zlib_decompress;
use rasterkit_core::image::CHANNELS;
use rasterkit_core::{AnimatedImage, Error, Image, Result};
use tracing::{debug, trace, warn};

use super::filter::unfilter_scanlines;
use super::{
    adam7_pass_size, chunk_crc, AnimationControl, ChunkType, ColorType, DisposeOp, FrameControl,
    InterlaceMethod, ADAM7_PASSES, MAX_DIMENSION, PNG_SIGNATURE,
};
use crate::canvas::{Compositor, Disposal};

/// PNG image information from `IHDR`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PngInfo {
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
    /// Bit depth.
    pub bit_depth: u8,
    /// Color type.
    pub color_type: ColorType,
    /// Interlace method.
    pub interlace: InterlaceMethod,
}

impl PngInfo {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != 13 {
            return Err(Error::corrupt(format!("IHDR length {} (expected 13)", data.len())));
        }
        let width = BigEndian::read_u32(&data[0..4]);
        let height = BigEndian::read_u32(&data[4..8]);
        if width == 0 || height == 0 || width as u64 > MAX_DIMENSION || height as u64 > MAX_DIMENSION {
            return Err(Error::corrupt(format!("invalid PNG dimensions {}x{}", width, height)));
        }

        let bit_depth = data[8];
        let color_type = ColorType::from_u8(data[9])
            .ok_or_else(|| Error::unsupported(format!("PNG color type {}", data[9])))?;
        if !color_type.allows_bit_depth(bit_depth) {
            return Err(Error::unsupported(format!(
                "bit depth {} for color type {:?}",
                bit_depth, color_type
            )));
        }
        if data[10] != 0 {
            return Err(Error::unsupported(format!("PNG compression method {}", data[10])));
        }
        if data[11] != 0 {
            return Err(Error::unsupported(format!("PNG filter method {}", data[11])));
        }
        let interlace = InterlaceMethod::from_u8(data[12])
            .ok_or_else(|| Error::unsupported(format!("PNG interlace method {}", data[12])))?;

        Ok(Self {
            width,
            height,
            bit_depth,
            color_type,
            interlace,
        })
    }

    fn bits_per_pixel(&self) -> usize {
        self.bit_depth as usize * self.color_type.channels() as usize
    }

    /// Bytes per complete pixel, at least one, as the filters see it.
    fn filter_bpp(&self) -> usize {
        self.bits_per_pixel().div_ceil(8)
    }

    fn row_bytes(&self, width: usize) -> usize {
        (width * self.bits_per_pixel()).div_ceil(8)
    }
}

/// One chunk, CRC already verified.
struct Chunk<'a> {
    kind: ChunkType,
    data: &'a [u8],
}

/// Walks the chunk list after the signature.
struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ChunkReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk<'a>>> {
        let rest = &self.data[self.pos..];
        if rest.is_empty() {
            return Ok(None);
        }
        if rest.len() < 12 {
            return Err(Error::corrupt("truncated PNG chunk header"));
        }
        let length = BigEndian::read_u32(&rest[0..4]) as usize;
        let kind = ChunkType::new([rest[4], rest[5], rest[6], rest[7]]);
        let Some(total) = length.checked_add(12).filter(|&t| t <= rest.len()) else {
            return Err(Error::corrupt(format!("chunk {} runs past the end of the data", kind)));
        };

        let data = &rest[8..8 + length];
        let stored = BigEndian::read_u32(&rest[8 + length..total]);
        let computed = chunk_crc(kind, data);
        if stored != computed {
            return Err(Error::corrupt(format!(
                "CRC mismatch in chunk {}: stored {:08x}, computed {:08x}",
                kind, stored, computed
            )));
        }

        self.pos += total;
        Ok(Some(Chunk { kind, data }))
    }
}

/// Where the default image stands relative to the chunk sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataState {
    NotSeen,
    Open,
    Closed,
}

/// An `fcTL` waiting for its image data.
enum PendingFrame {
    Absent,
    Open(RawFrame),
}

/// Frame control plus the compressed data gathered for it.
struct RawFrame {
    control: FrameControl,
    data: Vec<u8>,
    uses_idat: bool,
}

/// Everything collected from the chunk list.
struct Parsed {
    info: PngInfo,
    palette: Vec<[u8; 3]>,
    transparency: Option<Vec<u8>>,
    idat: Vec<u8>,
    animation: Option<AnimationControl>,
    frames: Vec<RawFrame>,
}

/// Sample-to-RGBA conversion context.
struct Converter<'a> {
    info: &'a PngInfo,
    palette: &'a [[u8; 3]],
    transparency: Option<&'a [u8]>,
}

impl Converter<'_> {
    #[inline]
    fn sample(&self, row: &[u8], index: usize) -> u16 {
        match self.info.bit_depth {
            16 => BigEndian::read_u16(&row[index * 2..index * 2 + 2]),
            8 => row[index] as u16,
            depth => {
                let depth = depth as usize;
                let bit = index * depth;
                let shift = 8 - depth - bit % 8;
                ((row[bit / 8] >> shift) & ((1u8 << depth) - 1)) as u16
            }
        }
    }

    #[inline]
    fn scale(&self, value: u16) -> u8 {
        match self.info.bit_depth {
            16 => (value >> 8) as u8,
            8 => value as u8,
            depth => (value as u32 * 255 / ((1u32 << depth) - 1)) as u8,
        }
    }

    fn key(&self, channel: usize) -> Option<u16> {
        self.transparency
            .filter(|t| t.len() >= channel * 2 + 2)
            .map(|t| BigEndian::read_u16(&t[channel * 2..channel * 2 + 2]))
    }

    /// Convert unfiltered rows of a `width` x `height` area to RGBA8.
    fn to_rgba(&self, raw: &[u8], width: usize, height: usize) -> Vec<u8> {
        let row_bytes = self.info.row_bytes(width);
        let mut out = Vec::with_capacity(width * height * CHANNELS);
        let gray_key = match self.info.color_type {
            ColorType::Grayscale => self.key(0),
            _ => None,
        };
        let rgb_key = match self.info.color_type {
            ColorType::Rgb => self.key(0).zip(self.key(1)).zip(self.key(2)),
            _ => None,
        };

        for row in raw.chunks_exact(row_bytes.max(1)).take(height) {
            for x in 0..width {
                let pixel = match self.info.color_type {
                    ColorType::Grayscale => {
                        let v = self.sample(row, x);
                        let g = self.scale(v);
                        let a = if gray_key == Some(v) { 0 } else { 255 };
                        [g, g, g, a]
                    }
                    ColorType::GrayscaleAlpha => {
                        let g = self.scale(self.sample(row, x * 2));
                        let a = self.scale(self.sample(row, x * 2 + 1));
                        [g, g, g, a]
                    }
                    ColorType::Rgb => {
                        let (r, g, b) = (
                            self.sample(row, x * 3),
                            self.sample(row, x * 3 + 1),
                            self.sample(row, x * 3 + 2),
                        );
                        let a = if rgb_key == Some(((r, g), b)) { 0 } else { 255 };
                        [self.scale(r), self.scale(g), self.scale(b), a]
                    }
                    ColorType::Rgba => [
                        self.scale(self.sample(row, x * 4)),
                        self.scale(self.sample(row, x * 4 + 1)),
                        self.scale(self.sample(row, x * 4 + 2)),
                        self.scale(self.sample(row, x * 4 + 3)),
                    ],
                    ColorType::Indexed => {
                        let index = self.sample(row, x) as usize;
                        match self.palette.get(index) {
                            Some(&[r, g, b]) => {
                                let a = self
                                    .transparency
                                    .and_then(|t| t.get(index).copied())
                                    .unwrap_or(255);
                                [r, g, b, a]
                            }
                            None => [0, 0, 0, 255],
                        }
                    }
                };
                out.extend_from_slice(&pixel);
            }
        }
        out
    }
}

/// PNG decoder.
#[derive(Debug, Default)]
pub struct PngDecoder {
    info: Option<PngInfo>,
    animation: Option<AnimationControl>,
}

impl PngDecoder {
    /// Create a new PNG decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Header of the last decoded stream.
    pub fn info(&self) -> Option<&PngInfo> {
        self.info.as_ref()
    }

    /// `acTL` of the last decoded stream, if it was animated.
    pub fn animation(&self) -> Option<AnimationControl> {
        self.animation
    }

    /// Decode a PNG or APNG into composited canvas frames.
    ///
    /// A static PNG yields one frame. An APNG yields one frame per `fcTL`;
    /// a default image outside the animation is not returned.
    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<AnimatedImage>> {
        if data.len() < PNG_SIGNATURE.len() || data[..8] != PNG_SIGNATURE {
            return Err(Error::corrupt("invalid PNG signature"));
        }
        self.info = None;
        self.animation = None;

        let parsed = parse_chunks(&data[8..])?;
        self.info = Some(parsed.info.clone());
        self.animation = parsed.animation;

        let converter = Converter {
            info: &parsed.info,
            palette: &parsed.palette,
            transparency: parsed.transparency.as_deref(),
        };

        if parsed.frames.is_empty() {
            let (width, height) = (parsed.info.width, parsed.info.height);
            let rgba = decode_pixels(&converter, &parsed.idat, width as usize, height as usize)?;
            debug!(width, height, "decoded static PNG");
            return Ok(vec![AnimatedImage::new(Image::new(width, height, rgba)?, 0)]);
        }

        if let Some(actl) = parsed.animation {
            if actl.num_frames as usize != parsed.frames.len() {
                warn!(
                    declared = actl.num_frames,
                    found = parsed.frames.len(),
                    "APNG frame count does not match acTL"
                );
            }
        }

        let mut compositor = Compositor::new(parsed.info.width, parsed.info.height)?;
        let mut output = Vec::with_capacity(parsed.frames.len());
        for (index, frame) in parsed.frames.iter().enumerate() {
            let control = &frame.control;
            let data = if frame.uses_idat { &parsed.idat } else { &frame.data };
            let rgba = decode_pixels(
                &converter,
                data,
                control.width as usize,
                control.height as usize,
            )?;

            let disposal = match (index, control.dispose_op) {
                (0, DisposeOp::Previous) => Disposal::Background,
                (_, op) => op.to_disposal(),
            };
            let canvas = compositor.draw(control.rect(), &rgba, control.blend_op.to_blend(), disposal)?;
            debug!(
                index,
                x = control.x_offset,
                y = control.y_offset,
                width = control.width,
                height = control.height,
                dispose = ?control.dispose_op,
                blend = ?control.blend_op,
                delay = control.delay_centis(),
                "decoded APNG frame"
            );
            output.push(AnimatedImage::new(canvas, control.delay_centis()));
        }
        Ok(output)
    }
}

/// Inflate, unfilter and convert one image's data.
fn decode_pixels(converter: &Converter<'_>, data: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let info = converter.info;
    let bpp = info.filter_bpp();

    match info.interlace {
        InterlaceMethod::None => {
            let row_bytes = info.row_bytes(width);
            let inflated = zlib_decompress(data, (row_bytes + 1) * height)?;
            let (raw, used) = unfilter_scanlines(&inflated, row_bytes, height, bpp)?;
            if used < inflated.len() {
                trace!(extra = inflated.len() - used, "ignoring trailing image data");
            }
            Ok(converter.to_rgba(&raw, width, height))
        }
        InterlaceMethod::Adam7 => {
            let expected: usize = (0..ADAM7_PASSES.len())
                .map(|pass| {
                    let (w, h) = adam7_pass_size(pass, width, height);
                    if w == 0 || h == 0 {
                        0
                    } else {
                        (info.row_bytes(w) + 1) * h
                    }
                })
                .sum();
            let inflated = zlib_decompress(data, expected)?;
            if inflated.len() < expected {
                return Err(Error::corrupt(format!(
                    "interlaced image data truncated: {} of {} bytes",
                    inflated.len(),
                    expected
                )));
            }
            let mut output = vec![0u8; width * height * CHANNELS];
            let mut pos = 0;

            for (pass, &(start_x, start_y, step_x, step_y)) in ADAM7_PASSES.iter().enumerate() {
                let (pass_width, pass_height) = adam7_pass_size(pass, width, height);
                if pass_width == 0 || pass_height == 0 {
                    continue;
                }
                let (raw, used) =
                    unfilter_scanlines(&inflated[pos..], info.row_bytes(pass_width), pass_height, bpp)?;
                pos += used;

                let pixels = converter.to_rgba(&raw, pass_width, pass_height);
                for (py, row) in pixels.chunks_exact(pass_width * CHANNELS).enumerate() {
                    let y = start_y + py * step_y;
                    for (px, pixel) in row.chunks_exact(CHANNELS).enumerate() {
                        let x = start_x + px * step_x;
                        let at = (y * width + x) * CHANNELS;
                        output[at..at + CHANNELS].copy_from_slice(pixel);
                    }
                }
            }
            Ok(output)
        }
    }
}

/// Fold the chunk list into headers and per-frame compressed data.
fn parse_chunks(data: &[u8]) -> Result<Parsed> {
    let mut reader = ChunkReader::new(data);

    let info = match reader.next_chunk()? {
        Some(chunk) if chunk.kind == ChunkType::IHDR => PngInfo::parse(chunk.data)?,
        Some(chunk) => {
            return Err(Error::corrupt(format!("first chunk is {}, expected IHDR", chunk.kind)));
        }
        None => return Err(Error::corrupt("PNG has no chunks")),
    };
    trace!(?info, "PNG header");

    let mut palette: Option<Vec<[u8; 3]>> = None;
    let mut transparency: Option<Vec<u8>> = None;
    let mut idat = Vec::new();
    let mut data_state = DataState::NotSeen;
    let mut animation: Option<AnimationControl> = None;
    let mut frames: Vec<RawFrame> = Vec::new();
    let mut pending = PendingFrame::Absent;
    let mut next_sequence = 0u32;
    let mut ended = false;

    while let Some(chunk) = reader.next_chunk()? {
        trace!(kind = %chunk.kind, len = chunk.data.len(), "PNG chunk");

        if data_state == DataState::Open && chunk.kind != ChunkType::IDAT {
            data_state = DataState::Closed;
        }

        match chunk.kind {
            ChunkType::IHDR => return Err(Error::corrupt("duplicate IHDR")),
            ChunkType::PLTE => {
                if data_state != DataState::NotSeen {
                    return Err(Error::corrupt("PLTE after image data"));
                }
                if palette.is_some() {
                    return Err(Error::corrupt("duplicate PLTE"));
                }
                if matches!(info.color_type, ColorType::Grayscale | ColorType::GrayscaleAlpha) {
                    return Err(Error::corrupt("PLTE in a grayscale image"));
                }
                if chunk.data.is_empty() || chunk.data.len() % 3 != 0 || chunk.data.len() > 256 * 3 {
                    return Err(Error::corrupt(format!("PLTE length {}", chunk.data.len())));
                }
                palette = Some(chunk.data.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect());
            }
            ChunkType::TRNS => {
                if data_state != DataState::NotSeen {
                    return Err(Error::corrupt("tRNS after image data"));
                }
                let valid = match info.color_type {
                    ColorType::Grayscale => chunk.data.len() == 2,
                    ColorType::Rgb => chunk.data.len() == 6,
                    ColorType::Indexed => {
                        palette.as_ref().is_some_and(|p| chunk.data.len() <= p.len())
                    }
                    ColorType::GrayscaleAlpha | ColorType::Rgba => false,
                };
                if valid {
                    transparency = Some(chunk.data.to_vec());
                } else {
                    warn!(len = chunk.data.len(), color_type = ?info.color_type, "ignoring invalid tRNS");
                }
            }
            ChunkType::ACTL => {
                if data_state != DataState::NotSeen {
                    warn!("ignoring acTL after image data");
                } else if animation.is_some() {
                    return Err(Error::corrupt("duplicate acTL"));
                } else {
                    let actl = AnimationControl::parse(chunk.data)?;
                    trace!(?actl, "APNG animation control");
                    animation = Some(actl);
                }
            }
            ChunkType::FCTL => {
                if animation.is_none() {
                    trace!("ignoring fcTL without acTL");
                    continue;
                }
                let control = FrameControl::parse(chunk.data)?;
                check_sequence(&mut next_sequence, control.sequence_number)?;
                check_frame_rect(&info, &control)?;

                let uses_idat = data_state == DataState::NotSeen;
                if uses_idat
                    && (control.x_offset != 0
                        || control.y_offset != 0
                        || control.width != info.width
                        || control.height != info.height)
                {
                    return Err(Error::corrupt("default image fcTL does not cover the canvas"));
                }
                if let PendingFrame::Open(frame) =
                    std::mem::replace(&mut pending, PendingFrame::Absent)
                {
                    close_frame(&mut frames, frame)?;
                }
                pending = PendingFrame::Open(RawFrame {
                    control,
                    data: Vec::new(),
                    uses_idat,
                });
            }
            ChunkType::IDAT => {
                if data_state == DataState::Closed {
                    return Err(Error::corrupt("IDAT chunks are not contiguous"));
                }
                if info.color_type == ColorType::Indexed && palette.is_none() {
                    return Err(Error::corrupt("indexed image without PLTE"));
                }
                data_state = DataState::Open;
                idat.extend_from_slice(chunk.data);
            }
            ChunkType::FDAT => {
                if animation.is_none() {
                    trace!("ignoring fdAT without acTL");
                    continue;
                }
                if chunk.data.len() < 4 {
                    return Err(Error::corrupt("fdAT without sequence number"));
                }
                check_sequence(&mut next_sequence, BigEndian::read_u32(&chunk.data[0..4]))?;
                match &mut pending {
                    PendingFrame::Open(frame) if !frame.uses_idat => {
                        frame.data.extend_from_slice(&chunk.data[4..]);
                    }
                    _ => return Err(Error::corrupt("fdAT without a preceding fcTL")),
                }
            }
            ChunkType::IEND => {
                ended = true;
                break;
            }
            other if other.is_critical() => {
                return Err(Error::unsupported(format!("unknown critical chunk {}", other)));
            }
            other => {
                trace!(kind = %other, "skipping ancillary chunk");
            }
        }
    }

    if !ended {
        return Err(Error::corrupt("missing IEND"));
    }
    if idat.is_empty() {
        return Err(Error::corrupt("no IDAT chunks"));
    }
    if info.color_type == ColorType::Indexed && palette.is_none() {
        return Err(Error::corrupt("indexed image without PLTE"));
    }
    if let PendingFrame::Open(frame) = pending {
        close_frame(&mut frames, frame)?;
    }

    Ok(Parsed {
        info,
        palette: palette.unwrap_or_default(),
        transparency,
        idat,
        animation,
        frames,
    })
}

fn check_sequence(next: &mut u32, found: u32) -> Result<()> {
    if found != *next {
        return Err(Error::corrupt(format!(
            "APNG sequence number {} (expected {})",
            found, next
        )));
    }
    *next = next.wrapping_add(1);
    Ok(())
}

fn check_frame_rect(info: &PngInfo, control: &FrameControl) -> Result<()> {
    let rect = control.rect();
    if rect.is_empty() || !rect.fits_within(info.width, info.height) {
        return Err(Error::corrupt(format!(
            "fcTL rectangle {}x{} at ({}, {}) outside the {}x{} canvas",
            control.width, control.height, control.x_offset, control.y_offset, info.width, info.height
        )));
    }
    Ok(())
}

fn close_frame(frames: &mut Vec<RawFrame>, frame: RawFrame) -> Result<()> {
    if !frame.uses_idat && frame.data.is_empty() {
        return Err(Error::corrupt(format!(
            "APNG frame {} has no fdAT data",
            frame.control.sequence_number
        )));
    }
    frames.push(frame);
    Ok(())
}
