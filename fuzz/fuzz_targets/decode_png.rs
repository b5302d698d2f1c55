#![no_main]

//! Fuzz target for the PNG/APNG decoder.
//!
//! Chunk CRCs are recomputed first, so the fuzzer spends its time past the
//! checksum gate instead of being rejected at the first chunk.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rasterkit_core::checksum::crc32;
use rasterkit_images::png::PngDecoder;

#[derive(Arbitrary, Debug)]
struct Chunk {
    kind: [u8; 4],
    data: Vec<u8>,
}

#[derive(Arbitrary, Debug)]
enum PngInput {
    /// Raw bytes, checksums and all.
    Raw(Vec<u8>),
    /// Well-framed chunks with valid CRCs.
    Chunks {
        width: u16,
        height: u16,
        bit_depth: u8,
        color_type: u8,
        interlace: bool,
        chunks: Vec<Chunk>,
    },
}

fn frame_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let mut body = kind.to_vec();
    body.extend_from_slice(data);
    out.extend_from_slice(&crc32(&body).to_be_bytes());
}

fuzz_target!(|input: PngInput| {
    let data = match input {
        PngInput::Raw(data) => data,
        PngInput::Chunks {
            width,
            height,
            bit_depth,
            color_type,
            interlace,
            chunks,
        } => {
            // Keep canvases small enough to allocate per frame.
            let width = (width % 512) as u32;
            let height = (height % 512) as u32;
            let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
            let mut ihdr = Vec::with_capacity(13);
            ihdr.extend_from_slice(&width.to_be_bytes());
            ihdr.extend_from_slice(&height.to_be_bytes());
            ihdr.extend_from_slice(&[bit_depth, color_type, 0, 0, interlace as u8]);
            frame_chunk(&mut png, b"IHDR", &ihdr);
            for chunk in chunks.iter().take(64) {
                frame_chunk(&mut png, &chunk.kind, &chunk.data);
            }
            frame_chunk(&mut png, b"IEND", &[]);
            png
        }
    };

    let mut decoder = PngDecoder::new();
    if let Ok(frames) = decoder.decode(&data) {
        assert!(!frames.is_empty());
        if let Some(info) = decoder.info() {
            for frame in &frames {
                assert_eq!((frame.width(), frame.height()), (info.width, info.height));
            }
        }
    }
});
