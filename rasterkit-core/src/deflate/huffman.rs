//! Canonical Huffman codes: decoding tables and length-limited code
//! construction.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::bitstream::BitReader;
use crate::error::{Error, Result};

/// Longest literal/length or distance code.
pub(crate) const MAX_BITS: usize = 15;
/// Longest code-length code.
pub(crate) const MAX_CODE_LENGTH_BITS: usize = 7;

/// Canonical Huffman decoder built from a list of code lengths.
#[derive(Debug, Clone)]
pub(crate) struct HuffmanDecoder {
    /// Number of codes of each length.
    counts: [u16; MAX_BITS + 1],
    /// Symbols ordered by code length, then by symbol value.
    symbols: Vec<u16>,
}

impl HuffmanDecoder {
    /// Build a decoder. Over-subscribed length sets fail; incomplete ones are
    /// accepted and fail only if an unassigned code is actually read.
    pub(crate) fn from_lengths(lengths: &[u8]) -> Result<Self> {
        let mut counts = [0u16; MAX_BITS + 1];
        for &len in lengths {
            if len as usize > MAX_BITS {
                return Err(Error::corrupt(format!("Huffman code length {} exceeds 15", len)));
            }
            counts[len as usize] += 1;
        }
        counts[0] = 0;

        let mut left: i32 = 1;
        for &count in &counts[1..] {
            left = (left << 1) - count as i32;
            if left < 0 {
                return Err(Error::corrupt("over-subscribed Huffman code lengths"));
            }
        }

        let mut offsets = [0u16; MAX_BITS + 2];
        for len in 1..=MAX_BITS {
            offsets[len + 1] = offsets[len] + counts[len];
        }
        let mut symbols = vec![0u16; offsets[MAX_BITS + 1] as usize];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len != 0 {
                let slot = &mut offsets[len as usize];
                symbols[*slot as usize] = symbol as u16;
                *slot += 1;
            }
        }

        Ok(Self { counts, symbols })
    }

    /// Decode one symbol.
    pub(crate) fn decode(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;
        for len in 1..=MAX_BITS {
            code |= reader.read_bits(1)? as i32;
            let count = self.counts[len] as i32;
            if code - first < count {
                return Ok(self.symbols[(index + code - first) as usize]);
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }
        Err(Error::corrupt("invalid Huffman code"))
    }
}

/// Assign canonical codes (MSB-first values) to a list of code lengths.
pub(crate) fn canonical_codes(lengths: &[u8]) -> Vec<u16> {
    let mut bl_count = [0u16; MAX_BITS + 1];
    for &len in lengths {
        bl_count[len as usize] += 1;
    }
    bl_count[0] = 0;

    let mut next_code = [0u16; MAX_BITS + 1];
    let mut code = 0u16;
    for bits in 1..=MAX_BITS {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                0
            } else {
                let c = next_code[len as usize];
                next_code[len as usize] += 1;
                c
            }
        })
        .collect()
}

/// Optimal-ish code lengths for `freqs`, no code longer than `max_bits`.
///
/// Builds an unrestricted Huffman tree, then redistributes over-long codes
/// until the Kraft sum is exactly one. When only one symbol is used a second
/// one is given a 1-bit code so the tree stays complete.
pub(crate) fn build_lengths(freqs: &[u32], max_bits: usize) -> Vec<u8> {
    let mut lengths = vec![0u8; freqs.len()];
    let used: Vec<usize> = (0..freqs.len()).filter(|&s| freqs[s] > 0).collect();

    match used.len() {
        0 => return lengths,
        1 => {
            lengths[used[0]] = 1;
            let other = if used[0] == 0 { 1 } else { 0 };
            if other < lengths.len() {
                lengths[other] = 1;
            }
            return lengths;
        }
        _ => {}
    }

    // Leaves are 0..used.len(), internal nodes follow.
    let mut parent = vec![usize::MAX; used.len() * 2 - 1];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = used
        .iter()
        .enumerate()
        .map(|(node, &sym)| Reverse((freqs[sym] as u64, node)))
        .collect();
    let mut next_node = used.len();
    while heap.len() > 1 {
        let (Some(Reverse((fa, a))), Some(Reverse((fb, b)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        parent[a] = next_node;
        parent[b] = next_node;
        heap.push(Reverse((fa + fb, next_node)));
        next_node += 1;
    }

    let mut depth = vec![0usize; next_node];
    for node in (0..next_node.saturating_sub(1)).rev() {
        depth[node] = depth[parent[node]] + 1;
    }

    let mut bl_count = vec![0usize; max_bits.max(depth.iter().copied().max().unwrap_or(0)) + 1];
    for &d in &depth[..used.len()] {
        bl_count[d.min(max_bits)] += 1;
    }

    // Kraft sum in units of 2^-max_bits.
    let mut total: usize = (1..=max_bits).map(|l| bl_count[l] << (max_bits - l)).sum();
    while total > 1 << max_bits {
        bl_count[max_bits] -= 1;
        for len in (1..max_bits).rev() {
            if bl_count[len] != 0 {
                bl_count[len] -= 1;
                bl_count[len + 1] += 2;
                break;
            }
        }
        total -= 1;
    }

    // Hand the shortest codes to the most frequent symbols.
    let mut by_freq = used;
    by_freq.sort_by_key(|&s| (Reverse(freqs[s]), s));
    let mut symbols = by_freq.into_iter();
    for len in 1..=max_bits {
        for _ in 0..bl_count[len] {
            if let Some(sym) = symbols.next() {
                lengths[sym] = len as u8;
            }
        }
    }

    lengths
}
