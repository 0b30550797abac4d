// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Energy dispersal sequence, polynomial x^9 + x^5 + 1.

/// First `len` bits of the dispersal sequence (register preset to all ones).
pub fn prbs(len: usize) -> Vec<u8> {
    let mut reg = [1u8; 9];
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        let bit = reg[8] ^ reg[4];
        reg.copy_within(0..8, 1);
        reg[0] = bit;
        out.push(bit);
    }
    out
}

/// XOR `bits` with the dispersal sequence in place.
pub fn disperse(bits: &mut [u8], sequence: &[u8]) {
    for (b, p) in bits.iter_mut().zip(sequence) {
        *b ^= p;
    }
}
