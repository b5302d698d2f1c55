//! DEFLATE decompression.

use std::sync::OnceLock;

use crate::bitstream::BitReader;
use crate::error::{Error, Result};

use super::huffman::HuffmanDecoder;
use super::{CODE_LENGTH_ORDER, DIST_BASE, DIST_EXTRA, LENGTH_BASE, LENGTH_EXTRA, WINDOW_SIZE};

struct Tables {
    litlen: HuffmanDecoder,
    dist: HuffmanDecoder,
}

fn fixed_tables() -> Result<&'static Tables> {
    static FIXED: OnceLock<Tables> = OnceLock::new();
    if let Some(tables) = FIXED.get() {
        return Ok(tables);
    }
    let tables = Tables {
        litlen: HuffmanDecoder::from_lengths(&fixed_litlen_lengths())?,
        dist: HuffmanDecoder::from_lengths(&[5u8; 30])?,
    };
    Ok(FIXED.get_or_init(|| tables))
}

/// Code lengths of the fixed literal/length code.
pub(crate) fn fixed_litlen_lengths() -> [u8; 288] {
    let mut lengths = [8u8; 288];
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths
}

/// Inflate a raw DEFLATE stream, appending to `out`.
///
/// Returns the number of input bytes consumed, so a caller can locate data
/// that follows the stream (the zlib trailer).
pub fn inflate(input: &[u8], out: &mut Vec<u8>) -> Result<usize> {
    let mut reader = BitReader::new(input);
    loop {
        let is_final = reader.read_bit()?;
        match reader.read_bits(2)? {
            0 => inflate_stored(&mut reader, out)?,
            1 => inflate_block(&mut reader, out, fixed_tables()?)?,
            2 => {
                let tables = read_dynamic_tables(&mut reader)?;
                inflate_block(&mut reader, out, &tables)?;
            }
            btype => {
                return Err(Error::corrupt(format!("invalid DEFLATE block type {}", btype)));
            }
        }
        if is_final {
            break;
        }
    }
    reader.align_to_byte();
    Ok(reader.byte_position())
}

fn inflate_stored(reader: &mut BitReader<'_>, out: &mut Vec<u8>) -> Result<()> {
    let header = reader.read_aligned_bytes(4)?;
    let len = u16::from_le_bytes([header[0], header[1]]);
    let nlen = u16::from_le_bytes([header[2], header[3]]);
    if len != !nlen {
        return Err(Error::corrupt("stored block length does not match its complement"));
    }
    out.extend_from_slice(reader.read_aligned_bytes(len as usize)?);
    Ok(())
}

fn inflate_block(reader: &mut BitReader<'_>, out: &mut Vec<u8>, tables: &Tables) -> Result<()> {
    loop {
        let symbol = tables.litlen.decode(reader)?;
        match symbol {
            0..=255 => out.push(symbol as u8),
            256 => return Ok(()),
            257..=285 => {
                let idx = (symbol - 257) as usize;
                let length =
                    LENGTH_BASE[idx] as usize + reader.read_bits(LENGTH_EXTRA[idx] as u32)? as usize;

                let dist_symbol = tables.dist.decode(reader)? as usize;
                if dist_symbol >= DIST_BASE.len() {
                    return Err(Error::corrupt(format!(
                        "invalid distance symbol {}",
                        dist_symbol
                    )));
                }
                let distance = DIST_BASE[dist_symbol] as usize
                    + reader.read_bits(DIST_EXTRA[dist_symbol] as u32)? as usize;
                if distance > out.len() || distance > WINDOW_SIZE {
                    return Err(Error::corrupt(format!(
                        "back-reference distance {} exceeds {} bytes of history",
                        distance,
                        out.len().min(WINDOW_SIZE)
                    )));
                }

                let start = out.len() - distance;
                if distance >= length {
                    out.extend_from_within(start..start + length);
                } else {
                    // Overlapping copy repeats the last `distance` bytes.
                    for i in 0..length {
                        let byte = out[start + i];
                        out.push(byte);
                    }
                }
            }
            _ => {
                return Err(Error::corrupt(format!(
                    "invalid literal/length symbol {}",
                    symbol
                )))
            }
        }
    }
}

fn read_dynamic_tables(reader: &mut BitReader<'_>) -> Result<Tables> {
    let hlit = reader.read_bits(5)? as usize + 257;
    let hdist = reader.read_bits(5)? as usize + 1;
    let hclen = reader.read_bits(4)? as usize + 4;
    if hlit > 286 || hdist > 30 {
        return Err(Error::corrupt(format!(
            "dynamic block declares {} literal and {} distance codes",
            hlit, hdist
        )));
    }

    let mut cl_lengths = [0u8; 19];
    for &slot in CODE_LENGTH_ORDER.iter().take(hclen) {
        cl_lengths[slot] = reader.read_bits(3)? as u8;
    }
    let cl_decoder = HuffmanDecoder::from_lengths(&cl_lengths)?;

    let total = hlit + hdist;
    let mut lengths: Vec<u8> = Vec::with_capacity(total);
    while lengths.len() < total {
        let symbol = cl_decoder.decode(reader)?;
        let (value, repeat) = match symbol {
            0..=15 => (symbol as u8, 1),
            16 => {
                let Some(&prev) = lengths.last() else {
                    return Err(Error::corrupt("code length repeat with no previous length"));
                };
                (prev, 3 + reader.read_bits(2)? as usize)
            }
            17 => (0, 3 + reader.read_bits(3)? as usize),
            18 => (0, 11 + reader.read_bits(7)? as usize),
            _ => return Err(Error::corrupt(format!("invalid code length symbol {}", symbol))),
        };
        if lengths.len() + repeat > total {
            return Err(Error::corrupt("code length repeat overruns the table"));
        }
        lengths.resize(lengths.len() + repeat, value);
    }

    if lengths[256] == 0 {
        return Err(Error::corrupt("dynamic block has no end-of-block code"));
    }

    Ok(Tables {
        litlen: HuffmanDecoder::from_lengths(&lengths[..hlit])?,
        dist: HuffmanDecoder::from_lengths(&lengths[hlit..])?,
    })
}
