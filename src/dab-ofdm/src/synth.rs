// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Minimal DAB transmitter for loopback testing.
//!
//! Produces baseband frames at 2.048 MS/s from hard bits: null symbol
//! (optionally carrying a TII comb), phase reference, then D-QPSK symbols.

use std::f32::consts::{FRAC_1_SQRT_2, PI};
use std::sync::Arc;

use dab_core::{ModeParams, TransmissionMode, SAMPLE_RATE_HZ};
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::interleaver::{carrier_bin, FrequencyInterleaver};
use crate::phase_ref::reference_spectrum;
use crate::tii;

fn to_time_domain(ifft: &dyn Fft<f32>, spectrum: &[Complex32], params: &ModeParams) -> Vec<Complex32> {
    let mut useful = spectrum.to_vec();
    ifft.process(&mut useful);
    let scale = 1.0 / (params.carriers as f32).sqrt();
    for v in &mut useful {
        *v *= scale;
    }
    let mut symbol = Vec::with_capacity(params.t_s);
    symbol.extend_from_slice(&useful[params.t_u - params.t_g..]);
    symbol.extend_from_slice(&useful);
    symbol
}

/// One phase reference symbol including its guard interval.
pub fn reference_symbol(params: &ModeParams) -> Vec<Complex32> {
    let ifft = FftPlanner::<f32>::new().plan_fft_inverse(params.t_u);
    to_time_domain(ifft.as_ref(), &reference_spectrum(params), params)
}

/// Mix `samples` up by `offset_hz`.
pub fn apply_frequency_offset(samples: &[Complex32], offset_hz: f32) -> Vec<Complex32> {
    let step = 2.0 * PI * offset_hz / SAMPLE_RATE_HZ as f32;
    samples
        .iter()
        .enumerate()
        .map(|(n, s)| {
            let phase = (step as f64 * n as f64).rem_euclid(2.0 * std::f64::consts::PI) as f32;
            s * Complex32::from_polar(1.0, phase)
        })
        .collect()
}

/// D-QPSK frame generator.
pub struct FrameSynth {
    params: ModeParams,
    interleaver: FrequencyInterleaver,
    ifft: Arc<dyn Fft<f32>>,
    prs: Vec<Complex32>,
}

impl FrameSynth {
    pub fn new(mode: TransmissionMode) -> Self {
        let params = mode.params();
        Self {
            params,
            interleaver: FrequencyInterleaver::new(&params),
            ifft: FftPlanner::<f32>::new().plan_fft_inverse(params.t_u),
            prs: reference_spectrum(&params),
        }
    }

    pub fn params(&self) -> &ModeParams {
        &self.params
    }

    /// Build one complete frame of `t_f` samples.
    ///
    /// `symbols[l]` holds the `2K` hard bits (0/1) of data symbol `l + 1`;
    /// missing symbols are sent as all zeros. `tii` places the comb of
    /// `(main_id, sub_id)` in the null symbol (mode I only).
    pub fn frame(&self, symbols: &[Vec<u8>], tii: Option<(u8, u8)>) -> Vec<Complex32> {
        let p = &self.params;
        let k = p.carriers;
        let mut out = Vec::with_capacity(p.t_f);

        out.extend(self.null_symbol(tii));
        out.extend(to_time_domain(self.ifft.as_ref(), &self.prs, p));

        let mut prev = self.prs.clone();
        for l in 0..p.symbols_per_frame - 1 {
            let bits = symbols.get(l);
            let mut next = vec![Complex32::new(0.0, 0.0); p.t_u];
            for n in 0..k {
                let (b0, b1) = match bits {
                    Some(b) => (b[n] & 1, b[n + k] & 1),
                    None => (0, 0),
                };
                let z = Complex32::new(
                    FRAC_1_SQRT_2 * (1.0 - 2.0 * b0 as f32),
                    FRAC_1_SQRT_2 * (1.0 - 2.0 * b1 as f32),
                );
                let bin = carrier_bin(self.interleaver.carrier(n) as i32, p.t_u);
                next[bin] = prev[bin] * z;
            }
            out.extend(to_time_domain(self.ifft.as_ref(), &next, p));
            prev = next;
        }
        debug_assert_eq!(out.len(), p.t_f);
        out
    }

    fn null_symbol(&self, tii: Option<(u8, u8)>) -> Vec<Complex32> {
        let p = &self.params;
        let silent = vec![Complex32::new(0.0, 0.0); p.t_null];
        let Some((main_id, sub_id)) = tii else {
            return silent;
        };
        let carriers = tii::comb_carriers(p, main_id, sub_id);
        if carriers.is_empty() {
            return silent;
        }

        let mut spectrum = vec![Complex32::new(0.0, 0.0); p.t_u];
        for k in carriers {
            for kk in [k, k + 1] {
                let bin = carrier_bin(kk, p.t_u);
                spectrum[bin] = self.prs[bin];
            }
        }
        let mut useful = spectrum;
        self.ifft.process(&mut useful);
        let scale = 1.0 / (p.carriers as f32).sqrt();
        let mut symbol = Vec::with_capacity(p.t_null);
        let prefix = p.t_null - p.t_u;
        symbol.extend(useful[p.t_u - prefix..].iter().map(|v| v * scale));
        symbol.extend(useful.iter().map(|v| v * scale));
        symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_has_nominal_length_and_silent_null() {
        for mode in [TransmissionMode::II, TransmissionMode::III] {
            let synth = FrameSynth::new(mode);
            let frame = synth.frame(&[], None);
            let p = synth.params();
            assert_eq!(frame.len(), p.t_f);
            assert!(frame[..p.t_null].iter().all(|s| s.norm() == 0.0));
            let power: f32 =
                frame[p.t_null..].iter().map(|s| s.norm_sqr()).sum::<f32>() / (p.t_f - p.t_null) as f32;
            assert!(power > 0.1 && power < 2.0 * p.t_u as f32 / p.carriers as f32);
        }
    }

    #[test]
    fn guard_interval_is_cyclic() {
        let p = TransmissionMode::II.params();
        let symbol = reference_symbol(&p);
        assert_eq!(symbol.len(), p.t_s);
        for i in 0..p.t_g {
            assert!((symbol[i] - symbol[i + p.t_u]).norm() < 1e-5);
        }
    }

    #[test]
    fn tii_null_symbol_is_weak_but_present() {
        let synth = FrameSynth::new(TransmissionMode::I);
        let p = *synth.params();
        let frame = synth.frame(&[], Some((5, 3)));
        let null_power: f32 = frame[..p.t_null].iter().map(|s| s.norm_sqr()).sum::<f32>();
        let prs_power: f32 = frame[p.t_null..p.t_null + p.t_s].iter().map(|s| s.norm_sqr()).sum::<f32>();
        assert!(null_power > 0.0);
        assert!(null_power < 0.05 * prs_power);
    }
}
