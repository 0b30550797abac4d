// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! CRC-16 protecting each Fast Information Block.

pub const FIB_BYTES: usize = 32;
/// Payload bytes ahead of the CRC word.
pub const FIB_DATA_BYTES: usize = 30;

const CRC_POLY: u16 = 0x1021;

/// CRC-16 CCITT, initial register all ones, no final inversion.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xffffu16;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC_POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// A FIB is valid when its last two bytes hold the ones complement of the
/// CRC over the 30 payload bytes.
pub fn check_fib(fib: &[u8]) -> bool {
    if fib.len() != FIB_BYTES {
        return false;
    }
    let stored = u16::from_be_bytes([fib[30], fib[31]]);
    stored == !crc16(&fib[..FIB_DATA_BYTES])
}

/// Write the CRC word of a FIB in place.
pub fn seal_fib(fib: &mut [u8; FIB_BYTES]) {
    let crc = !crc16(&fib[..FIB_DATA_BYTES]);
    fib[30..].copy_from_slice(&crc.to_be_bytes());
}
