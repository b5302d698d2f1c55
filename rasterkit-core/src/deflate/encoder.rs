//! DEFLATE compression: LZ77 tokens coded per block with whichever of the
//! stored, fixed-Huffman or dynamic-Huffman encodings is smallest.

use crate::bitstream::BitWriter;

use super::huffman::{build_lengths, canonical_codes, MAX_BITS, MAX_CODE_LENGTH_BITS};
use super::inflate::fixed_litlen_lengths;
use super::lz77::{Lz77Compressor, Token};
use super::{CODE_LENGTH_ORDER, DIST_BASE, DIST_EXTRA, LENGTH_BASE, LENGTH_EXTRA};

/// Tokens per block before a new block (and new Huffman tables) starts.
const BLOCK_TOKENS: usize = 16 * 1024;
/// Largest payload of one stored block.
const MAX_STORED: usize = 65_535;
const END_OF_BLOCK: usize = 256;

/// Compress `data` into a raw DEFLATE stream at `level` (0..=9).
pub fn deflate(data: &[u8], level: u8) -> Vec<u8> {
    let mut writer = BitWriter::with_capacity(data.len() / 2 + 64);

    if level == 0 || data.is_empty() {
        write_stored(&mut writer, data, true);
        return writer.finish();
    }

    let tokens = Lz77Compressor::new(level).compress(data);
    let blocks: Vec<&[Token]> = tokens.chunks(BLOCK_TOKENS).collect();
    let mut offset = 0;
    for (i, block) in blocks.iter().enumerate() {
        let is_final = i + 1 == blocks.len();
        let raw_len: usize = block.iter().map(token_len).sum();
        write_block(&mut writer, block, &data[offset..offset + raw_len], is_final);
        offset += raw_len;
    }
    writer.finish()
}

fn token_len(token: &Token) -> usize {
    match token {
        Token::Literal(_) => 1,
        Token::Match { length, .. } => *length as usize,
    }
}

/// Symbol, extra-bit count and extra value for a match length.
fn length_symbol(length: u16) -> (usize, u32, u32) {
    let idx = LENGTH_BASE.partition_point(|&base| base <= length) - 1;
    (257 + idx, LENGTH_EXTRA[idx] as u32, (length - LENGTH_BASE[idx]) as u32)
}

fn distance_symbol(distance: u16) -> (usize, u32, u32) {
    let idx = DIST_BASE.partition_point(|&base| base <= distance) - 1;
    (idx, DIST_EXTRA[idx] as u32, (distance - DIST_BASE[idx]) as u32)
}

/// One Huffman code: code lengths plus canonical code values.
struct Code {
    lengths: Vec<u8>,
    codes: Vec<u16>,
}

impl Code {
    fn new(lengths: Vec<u8>) -> Self {
        let codes = canonical_codes(&lengths);
        Self { lengths, codes }
    }

    #[inline]
    fn write(&self, writer: &mut BitWriter, symbol: usize) {
        writer.write_bits_rev(self.codes[symbol] as u32, self.lengths[symbol] as u32);
    }

    fn cost(&self, freqs: &[u32]) -> usize {
        freqs
            .iter()
            .zip(&self.lengths)
            .map(|(&f, &l)| f as usize * l as usize)
            .sum()
    }
}

struct Frequencies {
    litlen: [u32; 286],
    dist: [u32; 30],
    extra_bits: usize,
}

impl Frequencies {
    fn count(tokens: &[Token]) -> Self {
        let mut freqs = Frequencies {
            litlen: [0; 286],
            dist: [0; 30],
            extra_bits: 0,
        };
        for token in tokens {
            match *token {
                Token::Literal(b) => freqs.litlen[b as usize] += 1,
                Token::Match { length, distance } => {
                    let (ls, lbits, _) = length_symbol(length);
                    let (ds, dbits, _) = distance_symbol(distance);
                    freqs.litlen[ls] += 1;
                    freqs.dist[ds] += 1;
                    freqs.extra_bits += (lbits + dbits) as usize;
                }
            }
        }
        freqs.litlen[END_OF_BLOCK] = 1;
        freqs
    }
}

/// Dynamic block header: trimmed code lengths and their run-length coding.
struct DynamicHeader {
    hlit: usize,
    hdist: usize,
    hclen: usize,
    cl_code: Code,
    /// (symbol, extra bit count, extra value)
    runs: Vec<(u8, u32, u32)>,
}

impl DynamicHeader {
    fn new(litlen: &[u8], dist: &[u8]) -> Self {
        let hlit = trimmed_len(litlen, 257);
        let hdist = trimmed_len(dist, 1);

        let mut all = Vec::with_capacity(hlit + hdist);
        all.extend_from_slice(&litlen[..hlit]);
        all.extend_from_slice(&dist[..hdist]);
        let runs = run_length_code(&all);

        let mut cl_freqs = [0u32; 19];
        for &(sym, _, _) in &runs {
            cl_freqs[sym as usize] += 1;
        }
        let cl_code = Code::new(build_lengths(&cl_freqs, MAX_CODE_LENGTH_BITS));
        let hclen = CODE_LENGTH_ORDER
            .iter()
            .rposition(|&s| cl_code.lengths[s] != 0)
            .map_or(4, |p| (p + 1).max(4));

        Self {
            hlit,
            hdist,
            hclen,
            cl_code,
            runs,
        }
    }

    fn bits(&self) -> usize {
        let runs: usize = self
            .runs
            .iter()
            .map(|&(sym, extra, _)| self.cl_code.lengths[sym as usize] as usize + extra as usize)
            .sum();
        5 + 5 + 4 + 3 * self.hclen + runs
    }

    fn write(&self, writer: &mut BitWriter) {
        writer.write_bits((self.hlit - 257) as u32, 5);
        writer.write_bits((self.hdist - 1) as u32, 5);
        writer.write_bits((self.hclen - 4) as u32, 4);
        for &sym in CODE_LENGTH_ORDER.iter().take(self.hclen) {
            writer.write_bits(self.cl_code.lengths[sym] as u32, 3);
        }
        for &(sym, extra, value) in &self.runs {
            self.cl_code.write(writer, sym as usize);
            writer.write_bits(value, extra);
        }
    }
}

fn trimmed_len(lengths: &[u8], min: usize) -> usize {
    lengths
        .iter()
        .rposition(|&l| l != 0)
        .map_or(min, |p| (p + 1).max(min))
}

fn run_length_code(lengths: &[u8]) -> Vec<(u8, u32, u32)> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < lengths.len() {
        let value = lengths[i];
        let mut run = 1;
        while i + run < lengths.len() && lengths[i + run] == value {
            run += 1;
        }
        i += run;

        if value == 0 {
            while run >= 11 {
                let take = run.min(138);
                runs.push((18, 7, (take - 11) as u32));
                run -= take;
            }
            if run >= 3 {
                runs.push((17, 3, (run - 3) as u32));
                run = 0;
            }
        } else {
            runs.push((value, 0, 0));
            run -= 1;
            while run >= 3 {
                let take = run.min(6);
                runs.push((16, 2, (take - 3) as u32));
                run -= take;
            }
        }
        for _ in 0..run {
            runs.push((value, 0, 0));
        }
    }
    runs
}

fn stored_bits(raw_len: usize) -> usize {
    let blocks = raw_len.div_ceil(MAX_STORED).max(1);
    // Header bits, worst-case padding, LEN/NLEN.
    blocks * (3 + 7 + 32) + raw_len * 8
}

fn write_block(writer: &mut BitWriter, tokens: &[Token], raw: &[u8], is_final: bool) {
    let freqs = Frequencies::count(tokens);

    let fixed_lit = Code::new(fixed_litlen_lengths().to_vec());
    let fixed_dist = Code::new(vec![5u8; 30]);
    let fixed_bits = 3 + fixed_lit.cost(&freqs.litlen) + fixed_dist.cost(&freqs.dist) + freqs.extra_bits;

    let dyn_lit = Code::new(build_lengths(&freqs.litlen, MAX_BITS));
    let mut dist_lengths = build_lengths(&freqs.dist, MAX_BITS);
    if dist_lengths.iter().all(|&l| l == 0) {
        // No matches: a minimal complete distance code keeps decoders happy.
        dist_lengths[0] = 1;
        dist_lengths[1] = 1;
    }
    let dyn_dist = Code::new(dist_lengths);
    let header = DynamicHeader::new(&dyn_lit.lengths, &dyn_dist.lengths);
    let dynamic_bits = 3
        + header.bits()
        + dyn_lit.cost(&freqs.litlen)
        + dyn_dist.cost(&freqs.dist)
        + freqs.extra_bits;

    if stored_bits(raw.len()) <= fixed_bits.min(dynamic_bits) {
        write_stored(writer, raw, is_final);
    } else if fixed_bits <= dynamic_bits {
        writer.write_bits(is_final as u32, 1);
        writer.write_bits(1, 2);
        write_tokens(writer, tokens, &fixed_lit, &fixed_dist);
    } else {
        writer.write_bits(is_final as u32, 1);
        writer.write_bits(2, 2);
        header.write(writer);
        write_tokens(writer, tokens, &dyn_lit, &dyn_dist);
    }
}

fn write_tokens(writer: &mut BitWriter, tokens: &[Token], litlen: &Code, dist: &Code) {
    for token in tokens {
        match *token {
            Token::Literal(b) => litlen.write(writer, b as usize),
            Token::Match { length, distance } => {
                let (ls, lbits, lval) = length_symbol(length);
                litlen.write(writer, ls);
                writer.write_bits(lval, lbits);
                let (ds, dbits, dval) = distance_symbol(distance);
                dist.write(writer, ds);
                writer.write_bits(dval, dbits);
            }
        }
    }
    litlen.write(writer, END_OF_BLOCK);
}

fn write_stored(writer: &mut BitWriter, data: &[u8], is_final: bool) {
    let mut chunks = data.chunks(MAX_STORED).peekable();
    if chunks.peek().is_none() {
        write_stored_chunk(writer, &[], is_final);
        return;
    }
    while let Some(chunk) = chunks.next() {
        let last = is_final && chunks.peek().is_none();
        write_stored_chunk(writer, chunk, last);
    }
}

fn write_stored_chunk(writer: &mut BitWriter, chunk: &[u8], is_final: bool) {
    writer.write_bits(is_final as u32, 1);
    writer.write_bits(0, 2);
    writer.align_to_byte();
    let len = chunk.len() as u16;
    writer.write_bytes(&len.to_le_bytes());
    writer.write_bytes(&(!len).to_le_bytes());
    writer.write_bytes(chunk);
}
