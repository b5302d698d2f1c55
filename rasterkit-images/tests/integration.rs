//! Integration tests for rasterkit-images

use pretty_assertions::assert_eq;
use rasterkit_core::checksum::crc32;
use rasterkit_core::deflate::zlib_compress;
use rasterkit_core::{lzw, CompressionLevel};
use rasterkit_images::gif::{decode_gif, encode_gif, LoopCount};
use rasterkit_images::png::{decode_png, encode_apng};
use rasterkit_images::{
    decode_animation, detect_format, AnimatedImage, ApngEncoder, Error, GifDecoder, GifEncoder,
    Image, ImageFormat, PngDecoder,
};

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];
const CLEAR: [u8; 4] = [0, 0, 0, 0];

fn solid(width: u32, height: u32, pixel: [u8; 4], delay: u32) -> AnimatedImage {
    AnimatedImage::new(Image::filled(width, height, pixel).unwrap(), delay)
}

fn pixels(frame: &AnimatedImage) -> Vec<[u8; 4]> {
    frame
        .data()
        .chunks_exact(4)
        .map(|p| [p[0], p[1], p[2], p[3]])
        .collect()
}

/// Hand-built GIF89a stream with a 4-entry global palette.
struct GifBuilder {
    data: Vec<u8>,
}

impl GifBuilder {
    const PALETTE: [[u8; 3]; 4] = [[0, 0, 0], [255, 0, 0], [0, 255, 0], [0, 0, 255]];

    fn new(width: u16, height: u16) -> Self {
        let mut data = b"GIF89a".to_vec();
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.extend_from_slice(&[0x81, 0, 0]);
        for entry in Self::PALETTE {
            data.extend_from_slice(&entry);
        }
        Self { data }
    }

    fn graphic_control(mut self, disposal: u8, delay: u16) -> Self {
        self.data.extend_from_slice(&[0x21, 0xF9, 4, disposal << 2]);
        self.data.extend_from_slice(&delay.to_le_bytes());
        self.data.extend_from_slice(&[0, 0]);
        self
    }

    fn image(self, rect: (u16, u16, u16, u16), indices: &[u8], interlaced: bool) -> Self {
        let compressed = lzw::compress(indices, 2).unwrap();
        self.raw_image(rect, &compressed, interlaced)
    }

    fn raw_image(mut self, rect: (u16, u16, u16, u16), lzw_data: &[u8], interlaced: bool) -> Self {
        self.data.push(0x2C);
        for v in [rect.0, rect.1, rect.2, rect.3] {
            self.data.extend_from_slice(&v.to_le_bytes());
        }
        self.data.push(if interlaced { 0x40 } else { 0 });
        self.data.push(2);
        for block in lzw_data.chunks(255) {
            self.data.push(block.len() as u8);
            self.data.extend_from_slice(block);
        }
        self.data.push(0);
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.data.push(0x3B);
        self.data
    }
}

fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], body: &[u8]) {
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    let mut crc_input = kind.to_vec();
    crc_input.extend_from_slice(body);
    out.extend_from_slice(&crc32(&crc_input).to_be_bytes());
}

fn ihdr_rgba(width: u32, height: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&width.to_be_bytes());
    body.extend_from_slice(&height.to_be_bytes());
    body.extend_from_slice(&[8, 6, 0, 0, 0]);
    body
}

#[allow(clippy::too_many_arguments)]
fn fctl(seq: u32, width: u32, height: u32, x: u32, y: u32, num: u16, den: u16) -> Vec<u8> {
    let mut body = Vec::new();
    for v in [seq, width, height, x, y] {
        body.extend_from_slice(&v.to_be_bytes());
    }
    body.extend_from_slice(&num.to_be_bytes());
    body.extend_from_slice(&den.to_be_bytes());
    body.extend_from_slice(&[0, 0]);
    body
}

fn rgba_scanlines(rows: &[&[[u8; 4]]]) -> Vec<u8> {
    let mut raw = Vec::new();
    for row in rows {
        raw.push(0);
        for px in row.iter() {
            raw.extend_from_slice(px);
        }
    }
    zlib_compress(&raw, CompressionLevel::Default)
}

/// 2x1 APNG whose white default image is outside the animation and whose
/// only frame is a red pixel at (1, 0).
fn apng_with_hidden_default(fdat_sequence: u32) -> Vec<u8> {
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    chunk(&mut png, b"IHDR", &ihdr_rgba(2, 1));
    chunk(&mut png, b"acTL", &[0, 0, 0, 1, 0, 0, 0, 0]);
    chunk(&mut png, b"IDAT", &rgba_scanlines(&[&[WHITE, WHITE]]));
    chunk(&mut png, b"fcTL", &fctl(0, 1, 1, 1, 0, 1, 10));
    let mut fdat = fdat_sequence.to_be_bytes().to_vec();
    fdat.extend_from_slice(&rgba_scanlines(&[&[RED]]));
    chunk(&mut png, b"fdAT", &fdat);
    chunk(&mut png, b"IEND", &[]);
    png
}

#[test]
fn test_gif_restore_to_background() {
    let data = GifBuilder::new(4, 4)
        .graphic_control(2, 10)
        .image((0, 0, 2, 2), &[1, 1, 1, 1], false)
        .graphic_control(0, 20)
        .image((2, 2, 2, 2), &[3, 3, 3, 3], false)
        .finish();

    let frames = decode_gif(&data).unwrap();
    assert_eq!(frames.len(), 2);

    let first = &frames[0];
    assert_eq!((first.width(), first.height()), (4, 4));
    assert_eq!(first.get_pixel(0, 0), Some(RED));
    assert_eq!(first.get_pixel(1, 1), Some(RED));
    assert_eq!(first.get_pixel(3, 3), Some(CLEAR));

    let second = &frames[1];
    assert_eq!(second.delay, 20);
    for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        assert_eq!(second.get_pixel(x, y), Some(CLEAR), "({}, {})", x, y);
    }
    for (x, y) in [(2, 2), (3, 2), (2, 3), (3, 3)] {
        assert_eq!(second.get_pixel(x, y), Some(BLUE), "({}, {})", x, y);
    }
    assert_eq!(second.get_pixel(3, 0), Some(CLEAR));
}

#[test]
fn test_gif_restore_to_previous() {
    let data = GifBuilder::new(2, 1)
        .image((0, 0, 2, 1), &[1, 1], false)
        .graphic_control(3, 0)
        .image((1, 0, 1, 1), &[2], false)
        .image((0, 0, 1, 1), &[3], false)
        .finish();

    let frames = decode_gif(&data).unwrap();
    assert_eq!(pixels(&frames[1]), vec![RED, [0, 255, 0, 255]]);
    assert_eq!(pixels(&frames[2]), vec![BLUE, RED]);
}

#[test]
fn test_gif_interlaced_stream() {
    // 1x8: stored rows are 0, 4, 2, 6, 1, 3, 5, 7.
    let stored = [0, 0, 1, 1, 2, 2, 3, 3];
    let data = GifBuilder::new(1, 8)
        .image((0, 0, 1, 8), &stored, true)
        .finish();

    let frames = decode_gif(&data).unwrap();
    let column: Vec<u8> = (0..8)
        .map(|y| frames[0].get_pixel(0, y).unwrap())
        .map(|p| match p {
            [0, 0, 0, 255] => 0,
            [255, 0, 0, 255] => 1,
            [0, 255, 0, 255] => 2,
            _ => 3,
        })
        .collect();
    assert_eq!(column, vec![0, 2, 1, 2, 0, 3, 1, 3]);
}

#[test]
fn test_gif_lzw_code_out_of_range() {
    // Clear, literal 1, then code 7 while the next free code is 6.
    let data = GifBuilder::new(1, 2)
        .raw_image((0, 0, 1, 2), &[0xCC, 0x01], false)
        .finish();
    assert!(matches!(decode_gif(&data), Err(Error::CorruptStream(_))));
}

#[test]
fn test_gif_solid_frames_roundtrip() {
    let frames = vec![solid(2, 2, RED, 50), solid(2, 2, BLUE, 50)];
    let encoded = encode_gif(&frames).unwrap();
    let decoded = decode_gif(&encoded).unwrap();

    assert_eq!(decoded.len(), 2);
    for (frame, colour) in decoded.iter().zip([RED, BLUE]) {
        assert_eq!((frame.width(), frame.height()), (2, 2));
        assert_eq!((frame.x, frame.y), (0, 0));
        assert_eq!(frame.delay, 50);
        assert_eq!(pixels(frame), vec![colour; 4]);
    }
}

#[test]
fn test_gif_loop_count_roundtrip() {
    let encoded = GifEncoder::new()
        .loop_count(LoopCount::Finite(3))
        .encode(&[solid(1, 1, RED, 0)])
        .unwrap();
    let mut decoder = GifDecoder::new();
    decoder.decode(&encoded).unwrap();
    assert_eq!(decoder.loop_count(), Some(LoopCount::Finite(3)));
    assert_eq!(decoder.screen_descriptor().map(|s| s.width), Some(1));
}

#[test]
fn test_gif_empty_sequence() {
    assert!(matches!(encode_gif(&[]), Err(Error::InvalidDimensions(_))));
}

#[test]
fn test_png_corrupted_signature() {
    let mut encoded = encode_apng(&[solid(2, 2, RED, 10)]).unwrap();
    encoded[0] ^= 0xFF;
    assert!(matches!(decode_png(&encoded), Err(Error::CorruptStream(_))));
}

#[test]
fn test_png_crc_error() {
    let mut encoded = encode_apng(&[solid(2, 2, RED, 10)]).unwrap();
    // Last byte of the IHDR CRC.
    encoded[8 + 8 + 13 + 3] ^= 0x01;
    assert!(matches!(decode_png(&encoded), Err(Error::CorruptStream(_))));
}

#[test]
fn test_apng_hidden_default_image() {
    let data = apng_with_hidden_default(1);
    let mut decoder = PngDecoder::new();
    let frames = decoder.decode(&data).unwrap();

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].delay, 10);
    assert_eq!(pixels(&frames[0]), vec![CLEAR, RED]);
    assert_eq!(decoder.animation().map(|a| a.num_frames), Some(1));
    assert_eq!(decoder.info().map(|i| i.width), Some(2));
}

#[test]
fn test_apng_fdat_sequence_error() {
    let data = apng_with_hidden_default(2);
    assert!(matches!(decode_png(&data), Err(Error::CorruptStream(_))));
}

#[test]
fn test_apng_roundtrip_with_offsets() {
    let frames = vec![
        solid(3, 2, WHITE, 4),
        solid(1, 1, RED, 8).with_offset(2, 1),
    ];
    let encoded = ApngEncoder::new().encode(&frames).unwrap();
    let decoded = decode_png(&encoded).unwrap();

    assert_eq!(decoded.len(), 2);
    assert_eq!(pixels(&decoded[0]), vec![WHITE; 6]);
    assert_eq!(decoded[1].delay, 8);
    assert_eq!(
        pixels(&decoded[1]),
        vec![WHITE, WHITE, WHITE, WHITE, WHITE, RED]
    );
}

#[test]
fn test_decode_animation_dispatch() {
    let frames = vec![solid(2, 1, BLUE, 5)];
    let gif = encode_gif(&frames).unwrap();
    let png = encode_apng(&frames).unwrap();

    assert_eq!(detect_format(&gif), Some(ImageFormat::Gif));
    assert_eq!(detect_format(&png), Some(ImageFormat::Png));
    assert_eq!(decode_animation(&gif).unwrap(), decode_animation(&png).unwrap());
}
