//! LZ77 match finding with hash chains.

use super::{MAX_MATCH, MIN_MATCH, WINDOW_SIZE};

const HASH_BITS: u32 = 15;
const HASH_SIZE: usize = 1 << HASH_BITS;
const NO_POS: u32 = u32::MAX;

/// A literal byte or a back-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Raw byte.
    Literal(u8),
    /// Copy `length` bytes starting `distance` bytes back.
    Match {
        /// 3..=258.
        length: u16,
        /// 1..=32768.
        distance: u16,
    },
}

/// Greedy/lazy LZ77 matcher over a 32 KiB window.
pub struct Lz77Compressor {
    head: Vec<u32>,
    prev: Vec<u32>,
    max_chain: usize,
    nice_length: usize,
    lazy: bool,
}

impl Lz77Compressor {
    /// Matcher tuned for compression level 1..=9.
    pub fn new(level: u8) -> Self {
        let (max_chain, nice_length, lazy) = match level.clamp(1, 9) {
            1 => (4, 16, false),
            2 => (8, 32, false),
            3 => (16, 32, false),
            4 => (16, 64, true),
            5 => (32, 128, true),
            6 => (128, 128, true),
            7 => (256, 192, true),
            8 => (1024, MAX_MATCH, true),
            _ => (4096, MAX_MATCH, true),
        };
        Self {
            head: vec![NO_POS; HASH_SIZE],
            prev: vec![NO_POS; WINDOW_SIZE],
            max_chain,
            nice_length,
            lazy,
        }
    }

    /// Tokenize `data`.
    pub fn compress(&mut self, data: &[u8]) -> Vec<Token> {
        self.head.fill(NO_POS);
        self.prev.fill(NO_POS);

        let mut tokens = Vec::with_capacity(data.len() / 2 + 1);
        let mut pos = 0;
        while pos < data.len() {
            let found = self.find_match(data, pos);
            self.insert(data, pos);

            let Some((mut length, mut distance)) = found else {
                tokens.push(Token::Literal(data[pos]));
                pos += 1;
                continue;
            };

            // Defer by one byte if the next position matches longer.
            if self.lazy && length < self.nice_length && pos + 1 < data.len() {
                if let Some((next_len, next_dist)) = self.find_match(data, pos + 1) {
                    if next_len > length {
                        tokens.push(Token::Literal(data[pos]));
                        pos += 1;
                        self.insert(data, pos);
                        length = next_len;
                        distance = next_dist;
                    }
                }
            }

            tokens.push(Token::Match {
                length: length as u16,
                distance: distance as u16,
            });
            for p in pos + 1..pos + length {
                self.insert(data, p);
            }
            pos += length;
        }
        tokens
    }

    #[inline]
    fn hash(data: &[u8], pos: usize) -> Option<usize> {
        if pos + MIN_MATCH > data.len() {
            return None;
        }
        let v = (data[pos] as u32) << 16 | (data[pos + 1] as u32) << 8 | data[pos + 2] as u32;
        Some((v.wrapping_mul(0x9E37_79B1) >> (32 - HASH_BITS)) as usize)
    }

    fn insert(&mut self, data: &[u8], pos: usize) {
        if let Some(h) = Self::hash(data, pos) {
            self.prev[pos % WINDOW_SIZE] = self.head[h];
            self.head[h] = pos as u32;
        }
    }

    fn find_match(&self, data: &[u8], pos: usize) -> Option<(usize, usize)> {
        let h = Self::hash(data, pos)?;
        let max_len = (data.len() - pos).min(MAX_MATCH);
        let mut best_len = MIN_MATCH - 1;
        let mut best_dist = 0;

        let mut candidate = self.head[h];
        let mut chain = self.max_chain;
        while candidate != NO_POS && chain > 0 {
            let cand = candidate as usize;
            if cand >= pos || pos - cand > WINDOW_SIZE {
                break;
            }
            if data[cand + best_len] == data[pos + best_len] {
                let len = common_prefix(&data[cand..], &data[pos..], max_len);
                if len > best_len {
                    best_len = len;
                    best_dist = pos - cand;
                    if len >= self.nice_length || len == max_len {
                        break;
                    }
                }
            }
            let next = self.prev[cand % WINDOW_SIZE];
            // Stale links point forward once the window wraps.
            if next != NO_POS && next as usize >= cand {
                break;
            }
            candidate = next;
            chain -= 1;
        }

        (best_len >= MIN_MATCH).then_some((best_len, best_dist))
    }
}

#[inline]
fn common_prefix(a: &[u8], b: &[u8], max_len: usize) -> usize {
    a.iter()
        .zip(b.iter())
        .take(max_len)
        .take_while(|(x, y)| x == y)
        .count()
}

/// Expand tokens back into bytes.
#[cfg(test)]
pub(crate) fn expand(tokens: &[Token]) -> Vec<u8> {
    let mut out = Vec::new();
    for token in tokens {
        match *token {
            Token::Literal(b) => out.push(b),
            Token::Match { length, distance } => {
                let start = out.len() - distance as usize;
                for i in 0..length as usize {
                    let b = out[start + i];
                    out.push(b);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_pattern_matches() {
        let data = b"abcabcabcabcabcabc";
        let tokens = Lz77Compressor::new(6).compress(data);
        assert!(tokens.iter().any(|t| matches!(t, Token::Match { .. })));
        assert_eq!(expand(&tokens), data);
    }

    #[test]
    fn test_run_uses_overlapping_match() {
        let data = vec![0u8; 1000];
        let tokens = Lz77Compressor::new(1).compress(&data);
        assert!(tokens.len() < 10);
        assert_eq!(expand(&tokens), data);
    }

    #[test]
    fn test_matches_stay_in_bounds() {
        let data: Vec<u8> = (0..100_000u32).map(|i| ((i / 3) % 251) as u8).collect();
        for level in [1, 6, 9] {
            let tokens = Lz77Compressor::new(level).compress(&data);
            for token in &tokens {
                if let Token::Match { length, distance } = token {
                    assert!((MIN_MATCH..=MAX_MATCH).contains(&(*length as usize)));
                    assert!((1..=WINDOW_SIZE).contains(&(*distance as usize)));
                }
            }
            assert_eq!(expand(&tokens), data);
        }
    }

    #[test]
    fn test_short_input() {
        assert_eq!(
            Lz77Compressor::new(6).compress(b"ab"),
            vec![Token::Literal(b'a'), Token::Literal(b'b')]
        );
    }
}
