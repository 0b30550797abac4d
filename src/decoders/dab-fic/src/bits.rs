// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! MSB-first bit access for FIG payloads.

/// Read `width` (<= 32) bits starting at absolute bit `offset`.
/// Returns `None` if the field runs past the end of `data`.
pub fn bits_at(data: &[u8], offset: usize, width: usize) -> Option<u32> {
    debug_assert!(width <= 32);
    if offset + width > data.len() * 8 {
        return None;
    }
    let mut value = 0u32;
    for bit in offset..offset + width {
        let byte = data[bit / 8];
        value = (value << 1) | u32::from((byte >> (7 - bit % 8)) & 1);
    }
    Some(value)
}

/// Pack MSB-first hard bits (0/1) into bytes. A trailing partial byte is
/// zero-padded.
pub fn pack_bits(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, b)| acc | ((b & 1) << (7 - i)))
        })
        .collect()
}

/// Expand bytes into MSB-first hard bits.
pub fn unpack_bits(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1))
        .collect()
}

/// Sequential reader. Reads past the end return `None` and leave the
/// cursor unchanged, so a truncated record is dropped as a whole.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn read(&mut self, width: usize) -> Option<u32> {
        let value = bits_at(self.data, self.pos, width)?;
        self.pos += width;
        Some(value)
    }

    pub fn read_flag(&mut self) -> Option<bool> {
        self.read(1).map(|v| v != 0)
    }

    pub fn skip(&mut self, width: usize) -> Option<()> {
        if self.pos + width > self.data.len() * 8 {
            return None;
        }
        self.pos += width;
        Some(())
    }

    /// Borrow the next `len` whole bytes. The cursor must be byte aligned.
    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.pos % 8 != 0 {
            return None;
        }
        let start = self.pos / 8;
        let bytes = self.data.get(start..start + len)?;
        self.pos += len * 8;
        Some(bytes)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() * 8 - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fields_across_byte_boundaries() {
        let data = [0b1010_1100, 0b0101_0011, 0xff];
        assert_eq!(bits_at(&data, 0, 1), Some(1));
        assert_eq!(bits_at(&data, 4, 8), Some(0b1100_0101));
        assert_eq!(bits_at(&data, 6, 3), Some(0b000));
        assert_eq!(bits_at(&data, 0, 24), Some(0xac53ff));
        assert_eq!(bits_at(&data, 0, 0), Some(0));
    }

    #[test]
    fn exact_width_at_end_is_allowed() {
        let data = [0x12, 0x34];
        assert_eq!(bits_at(&data, 12, 4), Some(0x4));
        assert_eq!(bits_at(&data, 13, 4), None);
        assert_eq!(bits_at(&data, 16, 0), Some(0));
    }

    #[test]
    fn reader_keeps_position_on_short_read() {
        let data = [0xf0];
        let mut r = BitReader::new(&data);
        assert_eq!(r.read(3), Some(0b111));
        assert_eq!(r.read(6), None);
        assert_eq!(r.remaining(), 5);
        assert_eq!(r.read(5), Some(0b10000));
        assert!(r.is_empty());
    }

    #[test]
    fn byte_reads_require_alignment() {
        let data = [1, 2, 3, 4];
        let mut r = BitReader::new(&data);
        assert_eq!(r.read_bytes(2), Some(&data[..2]));
        r.skip(1).unwrap();
        assert_eq!(r.read_bytes(1), None);
        assert_eq!(r.read_bytes(5), None);
    }

    #[test]
    fn pack_and_unpack_are_msb_first() {
        assert_eq!(pack_bits(&[1, 0, 0, 0, 0, 0, 0, 1, 1]), vec![0x81, 0x80]);
        assert_eq!(unpack_bits(&[0xa0]), vec![1, 0, 1, 0, 0, 0, 0, 0]);
    }
}
