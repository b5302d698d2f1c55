//! DEFLATE (RFC 1951) and its zlib container (RFC 1950).
//!
//! PNG image data is a single zlib stream split across `IDAT`/`fdAT`
//! chunks. This module inflates such streams and produces them from raw
//! filtered scanlines.

mod encoder;
mod huffman;
mod inflate;
mod lz77;

pub use encoder::deflate;
pub use inflate::inflate;
pub use lz77::{Lz77Compressor, Token};

use crate::checksum::adler32;
use crate::error::{Error, Result};

/// Cap on up-front output allocation; size hints come from file headers.
const PREALLOC_LIMIT: usize = 1 << 24;

/// Size of the back-reference window.
pub const WINDOW_SIZE: usize = 32 * 1024;
/// Shortest back-reference DEFLATE can express.
pub const MIN_MATCH: usize = 3;
/// Longest back-reference DEFLATE can express.
pub const MAX_MATCH: usize = 258;

/// Base lengths for literal/length symbols 257..=285.
pub(crate) const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

pub(crate) const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Base distances for distance symbols 0..=29.
pub(crate) const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

pub(crate) const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Transmission order of code-length code lengths in a dynamic block header.
pub(crate) const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Compression effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompressionLevel {
    /// Stored blocks only.
    None,
    /// Short match search.
    Fast,
    /// Balanced.
    #[default]
    Default,
    /// Exhaustive match search.
    Best,
    /// Explicit level, clamped to 0..=9.
    Custom(u8),
}

impl CompressionLevel {
    /// Numeric level in 0..=9.
    pub fn level(&self) -> u8 {
        match self {
            CompressionLevel::None => 0,
            CompressionLevel::Fast => 1,
            CompressionLevel::Default => 6,
            CompressionLevel::Best => 9,
            CompressionLevel::Custom(level) => (*level).min(9),
        }
    }
}

/// Compress `data` into a zlib stream.
pub fn zlib_compress(data: &[u8], level: CompressionLevel) -> Vec<u8> {
    let level = level.level();
    let body = deflate(data, level);

    let mut output = Vec::with_capacity(body.len() + 6);
    output.extend_from_slice(&zlib_header(level));
    output.extend_from_slice(&body);
    output.extend_from_slice(&adler32(data).to_be_bytes());
    output
}

/// Decompress a zlib stream, verifying its header and Adler-32 trailer.
///
/// `size_hint` pre-allocates the output when the caller knows roughly how
/// much data to expect.
pub fn zlib_decompress(data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
    if data.len() < 6 {
        return Err(Error::corrupt("zlib stream too short"));
    }

    let cmf = data[0];
    let flg = data[1];
    if cmf & 0x0F != 8 {
        return Err(Error::corrupt(format!(
            "zlib compression method {} is not DEFLATE",
            cmf & 0x0F
        )));
    }
    if cmf >> 4 > 7 {
        return Err(Error::corrupt("zlib window size exceeds 32K"));
    }
    if (u16::from(cmf) << 8 | u16::from(flg)) % 31 != 0 {
        return Err(Error::corrupt("zlib header check failed"));
    }
    if flg & 0x20 != 0 {
        return Err(Error::corrupt("zlib preset dictionary is not allowed"));
    }

    let mut output = Vec::with_capacity(size_hint.min(PREALLOC_LIMIT));
    let consumed = inflate(&data[2..], &mut output)?;

    let trailer = 2 + consumed;
    let Some(adler_bytes) = data.get(trailer..trailer + 4) else {
        return Err(Error::corrupt("zlib stream missing Adler-32 trailer"));
    };
    let expected = u32::from_be_bytes([adler_bytes[0], adler_bytes[1], adler_bytes[2], adler_bytes[3]]);
    let actual = adler32(&output);
    if expected != actual {
        return Err(Error::corrupt(format!(
            "Adler-32 mismatch: expected {:#010x}, got {:#010x}",
            expected, actual
        )));
    }

    Ok(output)
}

fn zlib_header(level: u8) -> [u8; 2] {
    // Deflate, 32K window.
    let cmf: u8 = 0x78;
    let flevel: u8 = match level {
        0 | 1 => 0,
        2..=5 => 1,
        6 => 2,
        _ => 3,
    };
    let mut flg = flevel << 6;
    let check = 31 - ((u16::from(cmf) << 8 | u16::from(flg)) % 31);
    flg |= (check % 31) as u8;
    [cmf, flg]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scanlines() -> Vec<u8> {
        let mut data = Vec::new();
        for row in 0..64u32 {
            data.push((row % 5) as u8);
            for x in 0..256u32 {
                data.push(((x * row) / 7) as u8);
            }
        }
        data
    }

    #[test]
    fn test_zlib_header_check() {
        for level in 0..=9 {
            let header = zlib_header(level);
            assert_eq!(header[0], 0x78);
            assert_eq!((u16::from(header[0]) << 8 | u16::from(header[1])) % 31, 0);
        }
    }

    #[test]
    fn test_zlib_roundtrip_all_levels() {
        let data = sample_scanlines();
        for level in [
            CompressionLevel::None,
            CompressionLevel::Fast,
            CompressionLevel::Default,
            CompressionLevel::Best,
        ] {
            let compressed = zlib_compress(&data, level);
            let decompressed = zlib_decompress(&compressed, data.len()).unwrap();
            assert_eq!(decompressed, data, "level {:?}", level);
        }
    }

    #[test]
    fn test_compression_shrinks_repetitive_data() {
        let data = vec![7u8; 100_000];
        let compressed = zlib_compress(&data, CompressionLevel::Default);
        assert!(compressed.len() < 1_000);
    }

    #[test]
    fn test_empty_roundtrip() {
        let compressed = zlib_compress(&[], CompressionLevel::Default);
        assert!(zlib_decompress(&compressed, 0).unwrap().is_empty());
    }

    #[test]
    fn test_adler_mismatch() {
        let mut compressed = zlib_compress(b"hello hello hello", CompressionLevel::Default);
        let last = compressed.len() - 1;
        compressed[last] ^= 0xFF;
        assert!(matches!(
            zlib_decompress(&compressed, 0),
            Err(Error::CorruptStream(_))
        ));
    }

    #[test]
    fn test_bad_header() {
        assert!(zlib_decompress(&[0x78, 0x00, 0, 0, 0, 0], 0).is_err());
        assert!(zlib_decompress(&[0x79, 0x9C, 0, 0, 0, 0], 0).is_err());
        // FDICT set with a valid check value.
        assert!(zlib_decompress(&[0x78, 0xBB, 0, 0, 0, 0, 0, 0, 0, 0], 0).is_err());
    }

    #[test]
    fn test_decodes_reference_stream() {
        // zlib.compress(b"hello") from a stock zlib build.
        let stream = [
            0x78, 0x9C, 0xCB, 0x48, 0xCD, 0xC9, 0xC9, 0x07, 0x00, 0x06, 0x2C, 0x02, 0x15,
        ];
        assert_eq!(zlib_decompress(&stream, 5).unwrap(), b"hello");
    }

    #[test]
    fn test_compression_level_values() {
        assert_eq!(CompressionLevel::None.level(), 0);
        assert_eq!(CompressionLevel::Default.level(), 6);
        assert_eq!(CompressionLevel::Custom(42).level(), 9);
    }
}
