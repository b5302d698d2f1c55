//! Variable-width LZW as used by GIF image data.
//!
//! Codes are packed LSB-first. With minimum code size `m` the clear code is
//! `1 << m`, end-of-information is `clear + 1`, and codes start `m + 1` bits
//! wide, growing to at most 12 bits (4096 table entries).

use std::collections::HashMap;

use tracing::trace;

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{Error, Result};

/// Widest code GIF allows.
pub const MAX_CODE_SIZE: u8 = 12;
/// Table capacity at the widest code size.
pub const MAX_CODES: usize = 1 << MAX_CODE_SIZE;
/// Smallest minimum code size GIF permits.
pub const MIN_CODE_SIZE: u8 = 2;
/// Largest minimum code size the encoder writes (8-bit indices).
pub const MAX_ENCODE_MIN_CODE_SIZE: u8 = 8;

/// Cap on up-front output allocation; the declared size comes from the file.
const PREALLOC_LIMIT: usize = 1 << 22;

/// Decompress an LZW stream into at most `max_len` indices.
///
/// Decoding stops at the end-of-information code, once `max_len` indices
/// have been produced, or when the input runs out (a missing end code is
/// tolerated). Codes beyond the current table fail with
/// [`Error::CorruptStream`].
pub fn decompress(data: &[u8], min_code_size: u8, max_len: usize) -> Result<Vec<u8>> {
    if !(MIN_CODE_SIZE..MAX_CODE_SIZE).contains(&min_code_size) {
        return Err(Error::corrupt(format!(
            "invalid LZW minimum code size {}",
            min_code_size
        )));
    }

    let clear_code = 1u16 << min_code_size;
    let eoi_code = clear_code + 1;

    // String table: each entry is its prefix code plus one trailing byte.
    let mut prefix = vec![0u16; MAX_CODES];
    let mut suffix = vec![0u8; MAX_CODES];
    let mut first = vec![0u8; MAX_CODES];
    let mut length = vec![0u16; MAX_CODES];
    for code in 0..clear_code as usize {
        suffix[code] = code as u8;
        first[code] = code as u8;
        length[code] = 1;
    }

    let mut reader = BitReader::new(data);
    let mut output = Vec::with_capacity(max_len.min(PREALLOC_LIMIT));
    let mut code_size = min_code_size + 1;
    let mut next_code = eoi_code + 1;
    let mut prev: Option<u16> = None;

    while output.len() < max_len {
        let Some(code) = reader.try_read_bits(code_size as u32) else {
            trace!(decoded = output.len(), "LZW data ended without end code");
            break;
        };
        let code = code as u16;

        if code == clear_code {
            code_size = min_code_size + 1;
            next_code = eoi_code + 1;
            prev = None;
            continue;
        }
        if code == eoi_code {
            break;
        }

        let Some(prev_code) = prev else {
            if code > clear_code {
                return Err(Error::corrupt(format!(
                    "LZW code {} is not a literal after a clear code",
                    code
                )));
            }
            output.push(code as u8);
            prev = Some(code);
            continue;
        };

        if code > next_code || (code == next_code && next_code as usize >= MAX_CODES) {
            return Err(Error::corrupt(format!(
                "LZW code {} out of range (next code {})",
                code, next_code
            )));
        }

        if (next_code as usize) < MAX_CODES {
            // For code == next_code the new entry is prev + first(prev).
            let tail = if code < next_code {
                first[code as usize]
            } else {
                first[prev_code as usize]
            };
            let slot = next_code as usize;
            prefix[slot] = prev_code;
            suffix[slot] = tail;
            first[slot] = first[prev_code as usize];
            length[slot] = length[prev_code as usize] + 1;
            next_code += 1;
            if next_code == 1 << code_size && code_size < MAX_CODE_SIZE {
                code_size += 1;
            }
        }

        let len = length[code as usize] as usize;
        let start = output.len();
        output.resize(start + len, 0);
        let mut c = code as usize;
        for slot in output[start..].iter_mut().rev() {
            *slot = suffix[c];
            c = prefix[c] as usize;
        }
        prev = Some(code);
    }

    output.truncate(max_len);
    Ok(output)
}

/// Compress palette indices with the given minimum code size.
///
/// The stream starts with a clear code, emits a clear code and restarts
/// whenever the table fills, and always ends with end-of-information.
pub fn compress(indices: &[u8], min_code_size: u8) -> Result<Vec<u8>> {
    if !(MIN_CODE_SIZE..=MAX_ENCODE_MIN_CODE_SIZE).contains(&min_code_size) {
        return Err(Error::unsupported(format!(
            "LZW minimum code size {} outside {}..={}",
            min_code_size, MIN_CODE_SIZE, MAX_ENCODE_MIN_CODE_SIZE
        )));
    }

    let clear_code = 1u16 << min_code_size;
    let eoi_code = clear_code + 1;

    if let Some(&bad) = indices.iter().find(|&&i| i as u16 >= clear_code) {
        return Err(Error::unsupported(format!(
            "index {} does not fit LZW minimum code size {}",
            bad, min_code_size
        )));
    }

    let mut writer = BitWriter::with_capacity(indices.len() / 2 + 16);
    let mut table: HashMap<(u16, u8), u16> = HashMap::with_capacity(MAX_CODES);
    let mut code_size = min_code_size + 1;
    let mut next_code = eoi_code + 1;

    writer.write_bits(clear_code as u32, code_size as u32);

    let mut iter = indices.iter();
    if let Some(&head) = iter.next() {
        let mut current = head as u16;
        for &byte in iter {
            if let Some(&code) = table.get(&(current, byte)) {
                current = code;
                continue;
            }

            writer.write_bits(current as u32, code_size as u32);

            if (next_code as usize) < MAX_CODES {
                table.insert((current, byte), next_code);
                next_code += 1;
                if next_code > 1 << code_size && code_size < MAX_CODE_SIZE {
                    code_size += 1;
                }
            } else {
                writer.write_bits(clear_code as u32, code_size as u32);
                table.clear();
                code_size = min_code_size + 1;
                next_code = eoi_code + 1;
            }
            current = byte as u16;
        }
        writer.write_bits(current as u32, code_size as u32);
    }

    writer.write_bits(eoi_code as u32, code_size as u32);
    Ok(writer.finish())
}

/// Minimum code size for a palette of `colors` entries (at least 2).
pub fn min_code_size_for(colors: usize) -> u8 {
    let mut bits = MIN_CODE_SIZE;
    while (1usize << bits) < colors && bits < MAX_ENCODE_MIN_CODE_SIZE {
        bits += 1;
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_small() {
        let indices = vec![0, 1, 2, 3, 0, 1, 2, 3, 3, 3, 3, 3, 1, 1];
        let compressed = compress(&indices, 2).unwrap();
        let decoded = decompress(&compressed, 2, indices.len()).unwrap();
        assert_eq!(decoded, indices);
    }

    #[test]
    fn test_roundtrip_table_reset() {
        // Enough varied data to fill the 4096-entry table several times.
        let indices: Vec<u8> = (0..200_000u32)
            .map(|i| ((i * 7919) ^ (i >> 3)) as u8)
            .collect();
        let compressed = compress(&indices, 8).unwrap();
        let decoded = decompress(&compressed, 8, indices.len()).unwrap();
        assert_eq!(decoded, indices);
    }

    #[test]
    fn test_kwkwk_sequence() {
        // A run of one symbol exercises the code == next_code case.
        let indices = vec![1u8; 50];
        let compressed = compress(&indices, 2).unwrap();
        assert_eq!(decompress(&compressed, 2, 50).unwrap(), indices);
    }

    #[test]
    fn test_empty_input() {
        let compressed = compress(&[], 2).unwrap();
        // Clear (4) then EOI (5), three bits each.
        assert_eq!(compressed, vec![0b101_100]);
        assert!(decompress(&compressed, 2, 10).unwrap().is_empty());
    }

    #[test]
    fn test_missing_end_code_tolerated() {
        let indices = vec![0, 1, 2, 3];
        let mut compressed = compress(&indices, 2).unwrap();
        compressed.pop();
        let decoded = decompress(&compressed, 2, indices.len()).unwrap();
        assert!(indices.starts_with(&decoded));
    }

    #[test]
    fn test_out_of_range_code() {
        // Clear (4), literal 0, then code 7 while next code is 6.
        let mut writer = BitWriter::new();
        writer.write_bits(4, 3);
        writer.write_bits(0, 3);
        writer.write_bits(7, 3);
        let data = writer.finish();
        assert!(matches!(
            decompress(&data, 2, 16),
            Err(Error::CorruptStream(_))
        ));
    }

    #[test]
    fn test_first_code_must_be_literal() {
        let mut writer = BitWriter::new();
        writer.write_bits(4, 3);
        writer.write_bits(6, 3);
        assert!(decompress(&writer.finish(), 2, 4).is_err());
    }

    #[test]
    fn test_stops_at_expected_length() {
        let indices = vec![2u8; 64];
        let compressed = compress(&indices, 2).unwrap();
        assert_eq!(decompress(&compressed, 2, 10).unwrap().len(), 10);
    }

    #[test]
    fn test_invalid_min_code_size() {
        assert!(decompress(&[0], 1, 1).is_err());
        assert!(decompress(&[0], 12, 1).is_err());
        assert!(compress(&[0], 9).is_err());
        assert!(compress(&[4], 2).is_err());
    }

    #[test]
    fn test_min_code_size_for() {
        assert_eq!(min_code_size_for(1), 2);
        assert_eq!(min_code_size_for(4), 2);
        assert_eq!(min_code_size_for(5), 3);
        assert_eq!(min_code_size_for(256), 8);
    }
}
