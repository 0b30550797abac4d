// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Transmitter Identification Information carried in the null symbol.
//!
//! Mode I only. A transmitter lights carrier pairs `(k, k + 1)` with
//! `k = base + 2c + 48b` for each of four band quarters, where `c` is the
//! sub identifier and the set of `b` values with `a_b = 1` encodes the
//! main identifier.

use std::sync::Arc;

use dab_core::{ModeParams, TransmissionMode};
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::interleaver::carrier_bin;

pub const MAIN_IDS: u8 = 70;
pub const SUB_IDS: u8 = 24;

const BASES: [i32; 4] = [-768, -384, 1, 385];

/// Carrier pattern `a_7..a_0` of a main identifier. Patterns are the bytes
/// with exactly four bits set, in ascending order.
pub fn pattern(main_id: u8) -> Option<u8> {
    (0u8..=255)
        .filter(|v| v.count_ones() == 4)
        .nth(main_id as usize)
}

fn main_id_of(pattern: u8) -> Option<u8> {
    (0u8..=255)
        .filter(|v| v.count_ones() == 4)
        .position(|v| v == pattern)
        .map(|p| p as u8)
}

/// Lower carrier of every lit pair for `(main_id, sub_id)`. Empty when the
/// mode carries no TII or the identifiers are out of range.
pub fn comb_carriers(params: &ModeParams, main_id: u8, sub_id: u8) -> Vec<i32> {
    if params.mode != TransmissionMode::I || sub_id >= SUB_IDS {
        return Vec::new();
    }
    let Some(p) = pattern(main_id) else {
        return Vec::new();
    };
    let mut carriers = Vec::with_capacity(16);
    for base in BASES {
        for b in 0..8 {
            if p & (1 << b) != 0 {
                carriers.push(base + 2 * sub_id as i32 + 48 * b);
            }
        }
    }
    carriers
}

/// Accumulates null-symbol spectra and reports the strongest comb.
pub struct TiiDetector {
    params: ModeParams,
    fft: Arc<dyn Fft<f32>>,
    buf: Vec<Complex32>,
    power: Vec<f32>,
    frames: usize,
    frames_needed: usize,
}

impl TiiDetector {
    pub fn new(params: &ModeParams, frames_needed: usize) -> Self {
        Self {
            params: *params,
            fft: FftPlanner::<f32>::new().plan_fft_forward(params.t_u),
            buf: vec![Complex32::new(0.0, 0.0); params.t_u],
            power: vec![0.0; params.t_u],
            frames: 0,
            frames_needed: frames_needed.max(1),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.params.mode == TransmissionMode::I
    }

    /// Add one null symbol. Once enough frames are averaged a decision is
    /// made and the accumulator restarts.
    pub fn push_null(&mut self, null: &[Complex32]) -> Option<(u8, u8)> {
        let t_u = self.params.t_u;
        if !self.is_supported() || null.len() < t_u {
            return None;
        }
        self.buf.copy_from_slice(&null[null.len() - t_u..]);
        self.fft.process(&mut self.buf);
        for (acc, v) in self.power.iter_mut().zip(&self.buf) {
            *acc += v.norm_sqr();
        }
        self.frames += 1;
        if self.frames < self.frames_needed {
            return None;
        }

        let result = self.decide();
        self.power.fill(0.0);
        self.frames = 0;
        result
    }

    fn pair_energy(&self, k: i32) -> f32 {
        let t_u = self.params.t_u;
        self.power[carrier_bin(k, t_u)] + self.power[carrier_bin(k + 1, t_u)]
    }

    fn decide(&self) -> Option<(u8, u8)> {
        let t_u = self.params.t_u;
        let half = self.params.carriers as i32 / 2;
        let total: f32 = (-half..=half)
            .filter(|&k| k != 0)
            .map(|k| self.power[carrier_bin(k, t_u)])
            .sum();
        if total <= f32::EPSILON {
            return None;
        }
        let mean = total / self.params.carriers as f32;

        let mut best: Option<(f32, u8, [f32; 8])> = None;
        for c in 0..SUB_IDS {
            let mut energy = [0.0f32; 8];
            for (b, e) in energy.iter_mut().enumerate() {
                *e = BASES
                    .iter()
                    .map(|base| self.pair_energy(base + 2 * c as i32 + 48 * b as i32))
                    .sum();
            }
            let mut sorted = energy;
            sorted.sort_by(|a, b| b.total_cmp(a));
            let top: f32 = sorted[..4].iter().sum();
            if best.map_or(true, |(e, _, _)| top > e) {
                best = Some((top, c, energy));
            }
        }

        let (top, sub_id, energy) = best?;
        // 4 pattern bits, 4 quarters, 2 carriers per pair.
        if top / 32.0 < 4.0 * mean {
            return None;
        }

        let mut order: Vec<usize> = (0..8).collect();
        order.sort_by(|&a, &b| energy[b].total_cmp(&energy[a]));
        if energy[order[3]] < 2.0 * energy[order[4]] {
            return None;
        }
        let pattern = order[..4].iter().fold(0u8, |acc, &b| acc | (1 << b));
        let main_id = main_id_of(pattern)?;
        tracing::debug!("TII main {} sub {}", main_id, sub_id);
        Some((main_id, sub_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::FrameSynth;

    #[test]
    fn seventy_patterns_of_four_bits() {
        assert_eq!(pattern(0), Some(0x0f));
        assert_eq!(pattern(1), Some(0x17));
        assert_eq!(pattern(69), Some(0xf0));
        assert_eq!(pattern(70), None);
        for id in 0..MAIN_IDS {
            assert_eq!(main_id_of(pattern(id).unwrap()), Some(id));
        }
    }

    #[test]
    fn comb_stays_inside_its_quarter() {
        let p = TransmissionMode::I.params();
        for c in 0..SUB_IDS {
            let carriers = comb_carriers(&p, 69, c);
            assert_eq!(carriers.len(), 16);
            assert!(carriers.iter().all(|&k| k != 0 && k + 1 != 0));
            assert!(carriers.iter().all(|&k| k >= -768 && k + 1 <= 768));
        }
        assert!(comb_carriers(&TransmissionMode::II.params(), 0, 0).is_empty());
    }

    #[test]
    fn detects_transmitted_identifier() {
        let synth = FrameSynth::new(TransmissionMode::I);
        let p = *synth.params();
        let mut detector = TiiDetector::new(&p, 2);
        let frame = synth.frame(&[], Some((42, 11)));
        let null = &frame[..p.t_null];
        assert_eq!(detector.push_null(null), None);
        assert_eq!(detector.push_null(null), Some((42, 11)));
    }

    #[test]
    fn silent_null_yields_nothing() {
        let p = TransmissionMode::I.params();
        let mut detector = TiiDetector::new(&p, 1);
        let null = vec![Complex32::new(0.0, 0.0); p.t_null];
        assert_eq!(detector.push_null(&null), None);
    }

    #[test]
    fn other_modes_are_ignored() {
        let p = TransmissionMode::II.params();
        let mut detector = TiiDetector::new(&p, 1);
        assert!(!detector.is_supported());
        let null = vec![Complex32::new(1.0, 0.0); p.t_null];
        assert_eq!(detector.push_null(&null), None);
    }
}
