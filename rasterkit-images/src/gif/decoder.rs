//! GIF decoder implementation.

use byteorder::{ByteOrder, LittleEndian};
use rasterkit_core::{lzw, AnimatedImage, Error, Result};
use tracing::{debug, trace, warn};

use super::{
    interlaced_rows, DisposalMethod, LoopCount, ScreenDescriptor, APPLICATION_LABEL,
    COMMENT_LABEL, EXTENSION_INTRODUCER, GIF87A_SIGNATURE, GIF89A_SIGNATURE,
    GRAPHIC_CONTROL_LABEL, IMAGE_SEPARATOR, PLAIN_TEXT_LABEL, TRAILER,
};
use crate::canvas::{Blend, Compositor, Rect};

type Palette = Vec<[u8; 3]>;

/// Graphic Control Extension fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GraphicControl {
    disposal: DisposalMethod,
    delay: u16,
    transparent_index: Option<u8>,
}

/// Frame control waiting for the next image block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameControl {
    Absent,
    Pending(GraphicControl),
}

/// One parsed image block: descriptor, optional local table, LZW data.
struct ImageBlock {
    rect: Rect,
    interlaced: bool,
    local_palette: Option<Palette>,
    min_code_size: u8,
    data: Vec<u8>,
}

/// Top-level blocks between the header and the trailer.
enum Block {
    GraphicControl(GraphicControl),
    Loop(LoopCount),
    Image(ImageBlock),
    Skipped,
    Trailer,
}

/// Byte cursor over the GIF stream.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.data.len());
        let Some(end) = end else {
            return Err(Error::corrupt(format!(
                "GIF truncated in {} at offset {}",
                what, self.pos
            )));
        };
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn palette(&mut self, size_field: u8, what: &str) -> Result<Palette> {
        let entries = 1usize << (size_field + 1);
        let bytes = self.take(entries * 3, what)?;
        Ok(bytes.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
    }

    /// Walk a sub-block chain, handing each payload to `f`.
    fn sub_blocks(&mut self, mut f: impl FnMut(&'a [u8])) -> Result<()> {
        loop {
            let size = self.u8("sub-block size")? as usize;
            if size == 0 {
                return Ok(());
            }
            f(self.take(size, "sub-block")?);
        }
    }
}

/// GIF decoder.
///
/// Produces one canvas-sized RGBA frame per image block with every
/// disposal and transparency rule applied.
#[derive(Debug, Default)]
pub struct GifDecoder {
    screen: Option<ScreenDescriptor>,
    loop_count: Option<LoopCount>,
}

impl GifDecoder {
    /// Create a new GIF decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical screen descriptor of the last decoded stream.
    pub fn screen_descriptor(&self) -> Option<&ScreenDescriptor> {
        self.screen.as_ref()
    }

    /// Loop count from the NETSCAPE2.0 extension, if the stream had one.
    pub fn loop_count(&self) -> Option<LoopCount> {
        self.loop_count
    }

    /// Decode all frames.
    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<AnimatedImage>> {
        let mut reader = Reader::new(data);
        let signature = reader.take(6, "signature")?;
        if signature != GIF87A_SIGNATURE && signature != GIF89A_SIGNATURE {
            return Err(Error::corrupt(format!(
                "invalid GIF signature {:?}",
                String::from_utf8_lossy(signature)
            )));
        }

        let screen = parse_screen_descriptor(&mut reader)?;
        let global_palette = if screen.has_global_color_table {
            Some(reader.palette(screen.global_color_table_size, "global color table")?)
        } else {
            None
        };
        debug!(
            width = screen.width,
            height = screen.height,
            global_colors = global_palette.as_ref().map_or(0, |p| p.len()),
            "GIF logical screen"
        );
        self.screen = Some(screen.clone());
        self.loop_count = None;

        let mut compositor: Option<Compositor> = None;
        let mut control = FrameControl::Absent;
        let mut frames = Vec::new();

        while !reader.is_empty() {
            match next_block(&mut reader)? {
                Block::Trailer => break,
                Block::Skipped => {}
                Block::Loop(count) => self.loop_count = Some(count),
                Block::GraphicControl(gce) => {
                    if let FrameControl::Pending(_) = control {
                        warn!("GIF graphic control extension without an image, replaced");
                    }
                    control = FrameControl::Pending(gce);
                }
                Block::Image(block) => {
                    let gce = match std::mem::replace(&mut control, FrameControl::Absent) {
                        FrameControl::Pending(gce) => Some(gce),
                        FrameControl::Absent => None,
                    };
                    let canvas = match &mut compositor {
                        Some(canvas) => canvas,
                        slot @ None => slot.insert(create_canvas(&screen, &block.rect)?),
                    };
                    let palette = block
                        .local_palette
                        .as_ref()
                        .or(global_palette.as_ref())
                        .ok_or_else(|| {
                            Error::corrupt(format!(
                                "GIF frame {} has no local or global color table",
                                frames.len()
                            ))
                        })?;
                    let frame = render_frame(canvas, &block, palette, gce)?;
                    debug!(
                        index = frames.len(),
                        x = block.rect.x,
                        y = block.rect.y,
                        width = block.rect.width,
                        height = block.rect.height,
                        delay = frame.delay,
                        disposal = ?gce.map(|g| g.disposal).unwrap_or_default(),
                        "decoded GIF frame"
                    );
                    frames.push(frame);
                }
            }
        }

        if frames.is_empty() {
            return Err(Error::corrupt("GIF contains no image data"));
        }
        Ok(frames)
    }
}

fn parse_screen_descriptor(reader: &mut Reader<'_>) -> Result<ScreenDescriptor> {
    let bytes = reader.take(7, "logical screen descriptor")?;
    let packed = bytes[4];
    Ok(ScreenDescriptor {
        width: LittleEndian::read_u16(&bytes[0..2]),
        height: LittleEndian::read_u16(&bytes[2..4]),
        has_global_color_table: packed & 0x80 != 0,
        color_resolution: ((packed >> 4) & 0x07) + 1,
        sorted: packed & 0x08 != 0,
        global_color_table_size: packed & 0x07,
        background_color_index: bytes[5],
        pixel_aspect_ratio: bytes[6],
    })
}

fn next_block(reader: &mut Reader<'_>) -> Result<Block> {
    let introducer = reader.u8("block introducer")?;
    match introducer {
        TRAILER => Ok(Block::Trailer),
        IMAGE_SEPARATOR => parse_image_block(reader).map(Block::Image),
        EXTENSION_INTRODUCER => {
            let label = reader.u8("extension label")?;
            trace!(label, "GIF extension");
            match label {
                GRAPHIC_CONTROL_LABEL => parse_graphic_control(reader).map(Block::GraphicControl),
                APPLICATION_LABEL => parse_application(reader),
                COMMENT_LABEL | PLAIN_TEXT_LABEL => {
                    reader.sub_blocks(|_| {})?;
                    Ok(Block::Skipped)
                }
                other => {
                    debug!(label = other, "skipping unknown GIF extension");
                    reader.sub_blocks(|_| {})?;
                    Ok(Block::Skipped)
                }
            }
        }
        other => Err(Error::corrupt(format!(
            "unexpected GIF block introducer {:#04x} at offset {}",
            other,
            reader.pos - 1
        ))),
    }
}

fn parse_graphic_control(reader: &mut Reader<'_>) -> Result<GraphicControl> {
    let mut body: Option<&[u8]> = None;
    reader.sub_blocks(|block| {
        if body.is_none() {
            body = Some(block);
        }
    })?;
    let Some(body) = body.filter(|b| b.len() >= 4) else {
        return Err(Error::corrupt("graphic control extension shorter than 4 bytes"));
    };
    let packed = body[0];
    Ok(GraphicControl {
        disposal: DisposalMethod::from_packed(packed),
        delay: LittleEndian::read_u16(&body[1..3]),
        transparent_index: (packed & 0x01 != 0).then_some(body[3]),
    })
}

fn parse_application(reader: &mut Reader<'_>) -> Result<Block> {
    let mut blocks: Vec<&[u8]> = Vec::new();
    reader.sub_blocks(|block| blocks.push(block))?;

    let is_loop_extension = matches!(
        blocks.first(),
        Some(id) if *id == b"NETSCAPE2.0" || *id == b"ANIMEXTS1.0"
    );
    if is_loop_extension {
        if let Some(sub) = blocks.get(1).filter(|b| b.len() >= 3 && b[0] == 1) {
            let count = LoopCount::from_netscape(LittleEndian::read_u16(&sub[1..3]));
            trace!(?count, "GIF loop extension");
            return Ok(Block::Loop(count));
        }
    }
    Ok(Block::Skipped)
}

fn parse_image_block(reader: &mut Reader<'_>) -> Result<ImageBlock> {
    let desc = reader.take(9, "image descriptor")?;
    let rect = Rect::new(
        LittleEndian::read_u16(&desc[0..2]) as u32,
        LittleEndian::read_u16(&desc[2..4]) as u32,
        LittleEndian::read_u16(&desc[4..6]) as u32,
        LittleEndian::read_u16(&desc[6..8]) as u32,
    );
    let packed = desc[8];

    let local_palette = if packed & 0x80 != 0 {
        Some(reader.palette(packed & 0x07, "local color table")?)
    } else {
        None
    };

    let min_code_size = reader.u8("LZW minimum code size")?;
    let mut data = Vec::new();
    reader.sub_blocks(|block| data.extend_from_slice(block))?;

    Ok(ImageBlock {
        rect,
        interlaced: packed & 0x40 != 0,
        local_palette,
        min_code_size,
        data,
    })
}

/// Canvas from the logical screen, or from the first frame when the
/// screen declares a zero size.
fn create_canvas(screen: &ScreenDescriptor, first: &Rect) -> Result<Compositor> {
    let (width, height) = if screen.width == 0 || screen.height == 0 {
        warn!("GIF logical screen is empty, sizing canvas from the first frame");
        (first.x + first.width, first.y + first.height)
    } else {
        (screen.width as u32, screen.height as u32)
    };
    Compositor::new(width, height)
        .map_err(|_| Error::corrupt(format!("GIF canvas {}x{} is empty", width, height)))
}

fn render_frame(
    canvas: &mut Compositor,
    block: &ImageBlock,
    palette: &[[u8; 3]],
    gce: Option<GraphicControl>,
) -> Result<AnimatedImage> {
    let width = block.rect.width as usize;
    let height = block.rect.height as usize;
    let pixel_count = width * height;

    let indices = if pixel_count == 0 {
        Vec::new()
    } else {
        lzw::decompress(&block.data, block.min_code_size, pixel_count)?
    };
    if indices.len() < pixel_count {
        debug!(
            expected = pixel_count,
            decoded = indices.len(),
            "GIF frame data ended early"
        );
    }

    let transparent = gce.and_then(|g| g.transparent_index);
    // Only the on-canvas part is kept. Undecoded pixels stay transparent so
    // the canvas shows through.
    let visible = block.rect.clip(canvas.width(), canvas.height());
    let visible_width = visible.width as usize;
    let visible_height = visible.height as usize;
    let mut rgba = vec![0u8; visible_width * visible_height * 4];
    let rows = if block.interlaced {
        interlaced_rows(height)
    } else {
        (0..height).collect()
    };
    for (i, &index) in indices.iter().enumerate() {
        let (row, column) = (rows[i / width], i % width);
        if Some(index) == transparent || row >= visible_height || column >= visible_width {
            continue;
        }
        let offset = (row * visible_width + column) * 4;
        let [r, g, b] = palette.get(index as usize).copied().unwrap_or([0, 0, 0]);
        rgba[offset..offset + 4].copy_from_slice(&[r, g, b, 255]);
    }

    let disposal = gce.map(|g| g.disposal).unwrap_or_default().to_disposal();
    let image = canvas.draw(visible, &rgba, Blend::Over, disposal)?;
    Ok(AnimatedImage::new(
        image,
        gce.map_or(0, |g| g.delay as u32),
    ))
}
