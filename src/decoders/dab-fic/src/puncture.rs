// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Puncturing vectors of the rate 1/4 mother code.
//!
//! `PI_x` keeps `x + 8` of every 32 mother-code bits. The FIC uses PI_16 and
//! PI_15 over 128-bit blocks followed by the 24-bit tail vector PI_X.

/// Tail puncturing vector for the 6 flush bits.
pub const PI_X: [u8; 24] = [
    1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0,
];

/// Order in which the eight 4-bit groups gain an extra kept bit.
const UPGRADE_ORDER: [usize; 8] = [0, 4, 2, 6, 1, 5, 3, 7];

/// Puncturing vector `PI_x` for `x` in `1..=24`.
pub fn pi(x: usize) -> [u8; 32] {
    debug_assert!((1..=24).contains(&x));
    let mut v = [0u8; 32];
    for (rank, &group) in UPGRADE_ORDER.iter().enumerate() {
        let kept = 1 + usize::from(x > rank) + usize::from(x > rank + 8) + usize::from(x > rank + 16);
        for bit in 0..kept {
            v[group * 4 + bit] = 1;
        }
    }
    v
}

/// Keep-mask over the mother code of one FIC block of `block_bits`
/// information bits.
pub fn fic_mask(block_bits: usize) -> Vec<bool> {
    // Mother code: 4 bits per information bit plus 24 tail bits.
    let pi16_blocks = (block_bits * 4 - 3 * 128) / 128;
    let mut mask = Vec::with_capacity(block_bits * 4 + 24);
    for (count, vector) in [(pi16_blocks, pi(16)), (3, pi(15))] {
        for _ in 0..count * 4 {
            mask.extend(vector.iter().map(|&b| b == 1));
        }
    }
    mask.extend(PI_X.iter().map(|&b| b == 1));
    mask
}

/// Re-insert erasures (0) where the transmitter dropped bits.
pub fn depuncture(coded: &[i16], mask: &[bool], out: &mut Vec<i16>) {
    out.clear();
    let mut input = coded.iter();
    for &keep in mask {
        let value = if keep {
            input.next().copied().unwrap_or(0)
        } else {
            0
        };
        out.push(value);
    }
}

/// Drop mother-code bits according to `mask`.
pub fn puncture(mother: &[u8], mask: &[bool]) -> Vec<u8> {
    mother
        .iter()
        .zip(mask)
        .filter(|(_, &keep)| keep)
        .map(|(&b, _)| b)
        .collect()
}
