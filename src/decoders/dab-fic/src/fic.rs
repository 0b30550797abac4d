// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Fast Information Channel: soft bits of the FIC symbols in, CRC-checked
//! FIBs out.

use dab_core::ModeParams;
use serde::Serialize;

use crate::bits::pack_bits;
use crate::crc::{check_fib, FIB_BYTES};
use crate::prbs::{disperse, prbs};
use crate::puncture::{depuncture, fic_mask};
use crate::viterbi::Viterbi;

/// Receiver of validated FIBs.
pub trait FibSink {
    fn process_fib(&mut self, fib: &[u8; FIB_BYTES]);
}

impl<F: FnMut(&[u8; FIB_BYTES])> FibSink for F {
    fn process_fib(&mut self, fib: &[u8; FIB_BYTES]) {
        self(fib)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FicState {
    Idle,
    /// Holding FIC symbols `0..=n` of the current frame.
    Accumulating(usize),
    Decoding,
    /// Last frame produced at least one valid FIB.
    Valid,
    /// Last frame produced none.
    Invalid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FicStats {
    pub fibs_ok: u64,
    pub fibs_bad: u64,
    pub frames: u64,
    /// Frames without a single valid FIB.
    pub bad_frames: u64,
}

pub struct FicDecoder {
    params: ModeParams,
    mask: Vec<bool>,
    prbs: Vec<u8>,
    soft: Vec<i16>,
    mother: Vec<i16>,
    bits: Vec<u8>,
    viterbi: Viterbi,
    state: FicState,
    stats: FicStats,
    last_frame: (u32, u32),
}

impl FicDecoder {
    pub fn new(params: &ModeParams) -> Self {
        Self {
            params: *params,
            mask: fic_mask(params.fic_block_bits),
            prbs: prbs(params.fic_block_bits),
            soft: vec![0; params.fic_symbols * params.bits_per_symbol()],
            mother: Vec::new(),
            bits: Vec::new(),
            viterbi: Viterbi::new(),
            state: FicState::Idle,
            stats: FicStats::default(),
            last_frame: (0, 0),
        }
    }

    pub fn state(&self) -> FicState {
        self.state
    }

    pub fn stats(&self) -> FicStats {
        self.stats
    }

    /// Valid and failed FIB counts of the last decoded frame.
    pub fn last_frame(&self) -> (u32, u32) {
        self.last_frame
    }

    /// Share of valid FIBs in the last frame, 0..=100.
    pub fn quality(&self) -> u8 {
        let (ok, bad) = self.last_frame;
        if ok + bad == 0 {
            return 0;
        }
        (ok * 100 / (ok + bad)) as u8
    }

    /// Drop a partially accumulated frame.
    pub fn reset(&mut self) {
        self.state = FicState::Idle;
        self.last_frame = (0, 0);
    }

    /// Feed the soft bits of FIC symbol `index` (0-based within the FIC).
    /// After the last FIC symbol the frame is decoded and every FIB that
    /// passes its CRC is handed to `sink`.
    pub fn process_symbol<S: FibSink + ?Sized>(&mut self, index: usize, bits: &[i16], sink: &mut S) {
        let per_symbol = self.params.bits_per_symbol();
        if index >= self.params.fic_symbols || bits.len() < per_symbol {
            return;
        }
        let in_sequence = match self.state {
            _ if index == 0 => true,
            FicState::Accumulating(last) => last + 1 == index,
            _ => false,
        };
        if !in_sequence {
            tracing::trace!("FIC symbol {} out of sequence, frame dropped", index);
            self.state = FicState::Idle;
            return;
        }

        self.soft[index * per_symbol..(index + 1) * per_symbol].copy_from_slice(&bits[..per_symbol]);
        self.state = FicState::Accumulating(index);
        if index + 1 == self.params.fic_symbols {
            self.state = FicState::Decoding;
            self.decode_frame(sink);
        }
    }

    fn decode_frame<S: FibSink + ?Sized>(&mut self, sink: &mut S) {
        let coded_len = self.params.fic_coded_block_bits();
        let mut ok = 0u32;
        let mut bad = 0u32;

        for block in 0..self.params.fic_blocks_per_frame {
            let coded = &self.soft[block * coded_len..(block + 1) * coded_len];
            depuncture(coded, &self.mask, &mut self.mother);
            self.viterbi.decode(&self.mother, &mut self.bits);
            disperse(&mut self.bits, &self.prbs);
            let bytes = pack_bits(&self.bits);

            for chunk in bytes.chunks_exact(FIB_BYTES) {
                let Ok(fib) = <&[u8; FIB_BYTES]>::try_from(chunk) else {
                    continue;
                };
                if check_fib(fib) {
                    ok += 1;
                    sink.process_fib(fib);
                } else {
                    bad += 1;
                }
            }
        }

        self.stats.fibs_ok += u64::from(ok);
        self.stats.fibs_bad += u64::from(bad);
        self.stats.frames += 1;
        if ok == 0 {
            self.stats.bad_frames += 1;
        }
        self.last_frame = (ok, bad);
        self.state = if ok > 0 { FicState::Valid } else { FicState::Invalid };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{fib, fic_symbols};
    use dab_core::TransmissionMode;

    fn soft(bits: &[u8]) -> Vec<i16> {
        bits.iter().map(|&b| if b == 1 { 127 } else { -127 }).collect()
    }

    fn run_frame(dec: &mut FicDecoder, symbols: &[Vec<u8>]) -> Vec<[u8; FIB_BYTES]> {
        let mut received = Vec::new();
        let mut sink = |f: &[u8; FIB_BYTES]| received.push(*f);
        for (i, s) in symbols.iter().enumerate() {
            dec.process_symbol(i, &soft(s), &mut sink);
        }
        received
    }

    fn numbered_fibs(n: u8) -> Vec<[u8; FIB_BYTES]> {
        (0..n)
            .map(|i| fib(&[&[0x05, 0x00, 0x10, i, 0x00, 0x00]]).unwrap())
            .collect()
    }

    #[test]
    fn decodes_every_fib_of_every_mode() {
        for mode in TransmissionMode::ALL {
            let p = mode.params();
            let fibs = numbered_fibs(p.fibs_per_frame() as u8);
            let mut dec = FicDecoder::new(&p);
            let received = run_frame(&mut dec, &fic_symbols(&p, &fibs));
            assert_eq!(received, fibs, "mode {}", mode);
            assert_eq!(dec.state(), FicState::Valid);
            assert_eq!(dec.quality(), 100);
        }
    }

    #[test]
    fn corrupted_fib_is_dropped_and_counted() {
        let p = TransmissionMode::II.params();
        let mut fibs = numbered_fibs(3);
        fibs[1][4] ^= 0x01;
        let mut dec = FicDecoder::new(&p);
        let received = run_frame(&mut dec, &fic_symbols(&p, &fibs));
        assert_eq!(received, vec![fibs[0], fibs[2]]);
        let stats = dec.stats();
        assert_eq!(stats.fibs_ok, 2);
        assert_eq!(stats.fibs_bad, 1);
        assert_eq!(stats.bad_frames, 0);
        assert_eq!(dec.last_frame(), (2, 1));
    }

    #[test]
    fn frame_without_valid_fib_is_a_bad_frame() {
        let p = TransmissionMode::II.params();
        let mut fibs = numbered_fibs(3);
        for f in &mut fibs {
            f[31] ^= 0xff;
        }
        let mut dec = FicDecoder::new(&p);
        assert!(run_frame(&mut dec, &fic_symbols(&p, &fibs)).is_empty());
        assert_eq!(dec.stats().bad_frames, 1);
        assert_eq!(dec.stats().fibs_bad, 3);
        assert_eq!(dec.state(), FicState::Invalid);
        assert_eq!(dec.quality(), 0);
    }

    #[test]
    fn out_of_sequence_symbol_drops_the_frame() {
        let p = TransmissionMode::I.params();
        let symbols = fic_symbols(&p, &numbered_fibs(12));
        let mut dec = FicDecoder::new(&p);
        let mut calls = 0;
        let mut sink = |_: &[u8; FIB_BYTES]| calls += 1;
        dec.process_symbol(0, &soft(&symbols[0]), &mut sink);
        dec.process_symbol(2, &soft(&symbols[2]), &mut sink);
        assert_eq!(dec.state(), FicState::Idle);
        assert_eq!(calls, 0);
        assert_eq!(dec.stats().frames, 0);
    }
}
