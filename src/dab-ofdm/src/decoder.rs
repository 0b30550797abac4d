// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Differential QPSK demodulation of one OFDM symbol into soft bits.

use std::sync::Arc;

use dab_core::ModeParams;
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::interleaver::{carrier_bin, FrequencyInterleaver};

/// Magnitude of a fully confident soft bit.
pub const SOFT_MAX: i16 = 127;

pub struct OfdmDecoder {
    params: ModeParams,
    interleaver: FrequencyInterleaver,
    fft: Arc<dyn Fft<f32>>,
    current: Vec<Complex32>,
    previous: Vec<Complex32>,
    snr_db: f32,
}

impl OfdmDecoder {
    pub fn new(params: &ModeParams) -> Self {
        Self {
            params: *params,
            interleaver: FrequencyInterleaver::new(params),
            fft: FftPlanner::<f32>::new().plan_fft_forward(params.t_u),
            current: vec![Complex32::new(0.0, 0.0); params.t_u],
            previous: vec![Complex32::new(0.0, 0.0); params.t_u],
            snr_db: 0.0,
        }
    }

    pub fn params(&self) -> &ModeParams {
        &self.params
    }

    /// Store the spectrum of the phase reference symbol as the phase base
    /// for symbol 1. `symbol` is the useful part (`t_u` samples).
    pub fn process_reference(&mut self, symbol: &[Complex32]) {
        self.previous.copy_from_slice(&symbol[..self.params.t_u]);
        self.fft.process(&mut self.previous);
    }

    /// Demodulate the useful part of a data symbol into `2K` soft bits.
    ///
    /// Soft bit `n` comes from the real part of the carrier at logical
    /// position `n`, soft bit `n + K` from its imaginary part. Positive
    /// values mean a logical 1.
    pub fn decode_symbol(&mut self, symbol: &[Complex32], soft_bits: &mut [i16]) {
        let t_u = self.params.t_u;
        let k = self.params.carriers;
        debug_assert!(soft_bits.len() >= 2 * k);

        self.current.copy_from_slice(&symbol[..t_u]);
        self.fft.process(&mut self.current);

        for n in 0..k {
            let bin = carrier_bin(self.interleaver.carrier(n) as i32, t_u);
            let z = self.current[bin] * self.previous[bin].conj();
            let mag = z.norm();
            if mag <= f32::EPSILON {
                soft_bits[n] = 0;
                soft_bits[n + k] = 0;
                continue;
            }
            soft_bits[n] = (-z.re / mag * SOFT_MAX as f32) as i16;
            soft_bits[n + k] = (-z.im / mag * SOFT_MAX as f32) as i16;
        }

        self.snr_db = self.measure_snr();
        std::mem::swap(&mut self.current, &mut self.previous);
    }

    /// Power ratio of active carriers to the unused band edges of the last
    /// decoded symbol.
    pub fn snr_db(&self) -> f32 {
        self.snr_db
    }

    fn measure_snr(&self) -> f32 {
        let t_u = self.params.t_u;
        let half = self.params.carriers / 2;
        let signal: f32 = (1..=half)
            .flat_map(|k| [k, t_u - k])
            .map(|bin| self.current[bin].norm_sqr())
            .sum::<f32>()
            / self.params.carriers as f32;
        let noise_bins = half + 1..t_u - half;
        let noise_count = noise_bins.len().max(1);
        let noise: f32 = noise_bins.map(|bin| self.current[bin].norm_sqr()).sum::<f32>()
            / noise_count as f32;
        10.0 * (signal.max(1e-12) / noise.max(1e-12)).log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::FrameSynth;
    use dab_core::TransmissionMode;

    fn pseudo_random_bits(len: usize, seed: u32) -> Vec<u8> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((state >> 16) & 1) as u8
            })
            .collect()
    }

    #[test]
    fn recovers_transmitted_bits() {
        let synth = FrameSynth::new(TransmissionMode::II);
        let p = *synth.params();
        let symbols: Vec<Vec<u8>> = (0..4)
            .map(|l| pseudo_random_bits(p.bits_per_symbol(), l + 1))
            .collect();
        let frame = synth.frame(&symbols, None);

        let mut decoder = OfdmDecoder::new(&p);
        let mut pos = p.t_null;
        decoder.process_reference(&frame[pos + p.t_g..pos + p.t_s]);
        pos += p.t_s;

        let mut soft = vec![0i16; p.bits_per_symbol()];
        for bits in &symbols {
            decoder.decode_symbol(&frame[pos + p.t_g..pos + p.t_s], &mut soft);
            pos += p.t_s;
            for (s, b) in soft.iter().zip(bits) {
                assert_eq!(*s > 0, *b == 1);
                assert!(s.abs() > 80);
            }
        }
        assert!(decoder.snr_db() > 30.0);
    }

    #[test]
    fn silence_gives_erasures() {
        let p = TransmissionMode::IV.params();
        let mut decoder = OfdmDecoder::new(&p);
        let zeros = vec![Complex32::new(0.0, 0.0); p.t_u];
        decoder.process_reference(&zeros);
        let mut soft = vec![1i16; p.bits_per_symbol()];
        decoder.decode_symbol(&zeros, &mut soft);
        assert!(soft.iter().all(|&s| s == 0));
    }
}
