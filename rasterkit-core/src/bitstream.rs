//! LSB-first bit reading and writing.
//!
//! Both GIF's LZW and DEFLATE pack codes starting at the least significant
//! bit of each byte. The reader keeps up to 64 bits buffered so multi-bit
//! reads do not touch the input byte by byte.

use crate::error::{Error, Result};

/// Longest value [`BitReader::read_bits`] or [`BitWriter::write_bits`] accept.
pub const MAX_BITS: u32 = 32;

/// A bit reader over a byte slice, least significant bit first.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_buf: u64,
    bit_count: u32,
}

impl<'a> BitReader<'a> {
    /// Create a new bit reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_buf: 0,
            bit_count: 0,
        }
    }

    fn refill(&mut self) {
        while self.bit_count <= 56 && self.byte_pos < self.data.len() {
            self.bit_buf |= (self.data[self.byte_pos] as u64) << self.bit_count;
            self.byte_pos += 1;
            self.bit_count += 8;
        }
    }

    /// Number of unread bits.
    pub fn remaining_bits(&self) -> usize {
        (self.data.len() - self.byte_pos) * 8 + self.bit_count as usize
    }

    /// True once every bit has been consumed.
    pub fn is_eof(&self) -> bool {
        self.bit_count == 0 && self.byte_pos >= self.data.len()
    }

    /// Read `n` bits (`n <= 32`), failing at end of input.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        self.try_read_bits(n)
            .ok_or_else(|| Error::corrupt("unexpected end of bitstream"))
    }

    /// Read `n` bits, or `None` if fewer than `n` remain. Nothing is
    /// consumed on failure.
    pub fn try_read_bits(&mut self, n: u32) -> Option<u32> {
        debug_assert!(n <= MAX_BITS);
        if n == 0 {
            return Some(0);
        }
        if self.bit_count < n {
            self.refill();
            if self.bit_count < n {
                return None;
            }
        }
        let value = (self.bit_buf & ((1u64 << n) - 1)) as u32;
        self.bit_buf >>= n;
        self.bit_count -= n;
        Some(value)
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Discard bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        let drop = self.bit_count % 8;
        self.bit_buf >>= drop;
        self.bit_count -= drop;
    }

    /// Align to a byte boundary and take `n` raw bytes.
    pub fn read_aligned_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.align_to_byte();
        // Hand buffered whole bytes back to the slice.
        self.byte_pos -= (self.bit_count / 8) as usize;
        self.bit_buf = 0;
        self.bit_count = 0;

        let end = self
            .byte_pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::corrupt("unexpected end of bitstream"))?;
        let bytes = &self.data[self.byte_pos..end];
        self.byte_pos = end;
        Ok(bytes)
    }

    /// Byte offset of the first byte not yet pulled into the bit buffer,
    /// after giving back whole buffered bytes.
    pub fn byte_position(&self) -> usize {
        self.byte_pos - (self.bit_count / 8) as usize
    }
}

/// A bit writer producing LSB-first packed bytes.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    bit_buf: u64,
    bit_count: u32,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with reserved output capacity.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    /// Append the low `n` bits of `value` (`n <= 32`).
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= MAX_BITS);
        if n == 0 {
            return;
        }
        let masked = value as u64 & ((1u64 << n) - 1);
        self.bit_buf |= masked << self.bit_count;
        self.bit_count += n;
        while self.bit_count >= 8 {
            self.data.push(self.bit_buf as u8);
            self.bit_buf >>= 8;
            self.bit_count -= 8;
        }
    }

    /// Append an `n`-bit Huffman code, most significant bit first.
    pub fn write_bits_rev(&mut self, code: u32, n: u32) {
        self.write_bits(reverse_bits(code, n), n);
    }

    /// Pad with zero bits to a byte boundary.
    pub fn align_to_byte(&mut self) {
        if self.bit_count > 0 {
            self.data.push(self.bit_buf as u8);
            self.bit_buf = 0;
            self.bit_count = 0;
        }
    }

    /// Align, then append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.align_to_byte();
        self.data.extend_from_slice(bytes);
    }

    /// Total bits written so far.
    pub fn bit_len(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// Flush the partial byte and return the output.
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }
}

/// Reverse the low `n` bits of `code`.
#[inline]
pub fn reverse_bits(code: u32, n: u32) -> u32 {
    if n == 0 {
        return 0;
    }
    code.reverse_bits() >> (32 - n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits_lsb_first() {
        let data = [0b1010_1100, 0b0000_0011];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(2).unwrap(), 0b00);
        assert_eq!(reader.read_bits(3).unwrap(), 0b011);
        assert_eq!(reader.read_bits(5).unwrap(), 0b11_101);
        assert_eq!(reader.remaining_bits(), 6);
    }

    #[test]
    fn test_read_past_end() {
        let data = [0xFF];
        let mut reader = BitReader::new(&data);
        assert!(reader.try_read_bits(9).is_none());
        // A failed read consumes nothing.
        assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
        assert!(matches!(reader.read_bits(1), Err(Error::CorruptStream(_))));
        assert!(reader.is_eof());
    }

    #[test]
    fn test_read_aligned_bytes() {
        let data = [0b0000_0101, 0xAA, 0xBB, 0xCC];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_aligned_bytes(2).unwrap(), &[0xAA, 0xBB]);
        assert_eq!(reader.read_bits(8).unwrap(), 0xCC);
        assert!(reader.read_aligned_bytes(1).is_err());
    }

    #[test]
    fn test_writer_packs_lsb_first() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b1, 1);
        writer.write_bits(0b10, 2);
        writer.write_bits(0b11111, 5);
        writer.write_bits(0b1, 1);
        assert_eq!(writer.bit_len(), 9);
        assert_eq!(writer.finish(), vec![0b1111_1101, 0b0000_0001]);
    }

    #[test]
    fn test_write_bits_rev() {
        let mut writer = BitWriter::new();
        writer.write_bits_rev(0b110, 3);
        assert_eq!(writer.finish(), vec![0b011]);
    }

    #[test]
    fn test_reverse_bits() {
        assert_eq!(reverse_bits(0b0011, 4), 0b1100);
        assert_eq!(reverse_bits(0b1, 1), 0b1);
        assert_eq!(reverse_bits(0, 0), 0);
    }
}
