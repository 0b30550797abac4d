// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Phase reference symbol: fine time synchronisation by correlation and
//! integer carrier offset estimation.

use std::f32::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

use dab_core::{ModeParams, TransmissionMode};
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use thiserror::Error;

use crate::interleaver::carrier_bin;

/// Largest integer carrier shift searched either side of zero.
pub const SEARCH_RANGE: i32 = 35;
/// Adjacent carrier pairs compared during offset estimation.
const DIFF_LENGTH: usize = 128;

/// The correlation peak did not stand out against the average.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("no phase reference correlation peak (peak/average {ratio:.1})")]
pub struct NoSync {
    pub ratio: f32,
}

const H: [[u8; 32]; 4] = [
    [
        0, 2, 0, 0, 0, 0, 1, 1, 2, 0, 0, 0, 2, 2, 1, 1, 0, 2, 0, 0, 0, 0, 1, 1, 2, 0, 0, 0, 2, 2, 1,
        1,
    ],
    [
        0, 3, 2, 3, 0, 1, 3, 0, 2, 1, 2, 3, 2, 3, 3, 0, 0, 3, 2, 3, 0, 1, 3, 0, 2, 1, 2, 3, 2, 3, 3,
        0,
    ],
    [
        0, 0, 0, 2, 0, 2, 1, 3, 2, 2, 0, 2, 2, 0, 1, 3, 0, 0, 0, 2, 0, 2, 1, 3, 2, 2, 0, 2, 2, 0, 1,
        3,
    ],
    [
        0, 1, 2, 1, 0, 3, 3, 2, 2, 3, 2, 1, 2, 1, 3, 2, 0, 1, 2, 1, 0, 3, 3, 2, 2, 3, 2, 1, 2, 1, 3,
        2,
    ],
];

/// `(k_min, k_max, i, n)`: carriers `k_min..=k_max` take phase
/// `pi/2 * (h[i][k - k_min] + n)`.
type Row = (i16, i16, u8, u8);

const ROWS_MODE_I: [Row; 48] = [
    (-768, -737, 0, 1),
    (-736, -705, 1, 2),
    (-704, -673, 2, 0),
    (-672, -641, 3, 1),
    (-640, -609, 0, 3),
    (-608, -577, 1, 2),
    (-576, -545, 2, 2),
    (-544, -513, 3, 3),
    (-512, -481, 0, 2),
    (-480, -449, 1, 1),
    (-448, -417, 2, 2),
    (-416, -385, 3, 3),
    (-384, -353, 0, 1),
    (-352, -321, 1, 2),
    (-320, -289, 2, 3),
    (-288, -257, 3, 3),
    (-256, -225, 0, 2),
    (-224, -193, 1, 2),
    (-192, -161, 2, 2),
    (-160, -129, 3, 1),
    (-128, -97, 0, 1),
    (-96, -65, 1, 3),
    (-64, -33, 2, 1),
    (-32, -1, 3, 2),
    (1, 32, 0, 3),
    (33, 64, 3, 1),
    (65, 96, 2, 1),
    (97, 128, 1, 1),
    (129, 160, 0, 2),
    (161, 192, 3, 2),
    (193, 224, 2, 1),
    (225, 256, 1, 0),
    (257, 288, 0, 2),
    (289, 320, 3, 2),
    (321, 352, 2, 3),
    (353, 384, 1, 3),
    (385, 416, 0, 0),
    (417, 448, 3, 2),
    (449, 480, 2, 1),
    (481, 512, 1, 3),
    (513, 544, 0, 3),
    (545, 576, 3, 3),
    (577, 608, 2, 3),
    (609, 640, 1, 0),
    (641, 672, 0, 3),
    (673, 704, 3, 0),
    (705, 736, 2, 1),
    (737, 768, 1, 1),
];

const ROWS_MODE_II: [Row; 12] = [
    (-192, -161, 0, 2),
    (-160, -129, 1, 3),
    (-128, -97, 2, 2),
    (-96, -65, 3, 2),
    (-64, -33, 0, 1),
    (-32, -1, 1, 2),
    (1, 32, 2, 0),
    (33, 64, 1, 2),
    (65, 96, 0, 2),
    (97, 128, 3, 1),
    (129, 160, 2, 0),
    (161, 192, 1, 3),
];

const ROWS_MODE_III: [Row; 6] = [
    (-96, -65, 0, 2),
    (-64, -33, 1, 3),
    (-32, -1, 2, 0),
    (1, 32, 3, 2),
    (33, 64, 2, 2),
    (65, 96, 1, 2),
];

const ROWS_MODE_IV: [Row; 24] = [
    (-384, -353, 0, 0),
    (-352, -321, 1, 1),
    (-320, -289, 2, 1),
    (-288, -257, 3, 2),
    (-256, -225, 0, 2),
    (-224, -193, 1, 2),
    (-192, -161, 2, 0),
    (-160, -129, 3, 3),
    (-128, -97, 0, 3),
    (-96, -65, 1, 1),
    (-64, -33, 2, 3),
    (-32, -1, 3, 2),
    (1, 32, 0, 0),
    (33, 64, 3, 1),
    (65, 96, 2, 0),
    (97, 128, 1, 2),
    (129, 160, 0, 0),
    (161, 192, 3, 1),
    (193, 224, 2, 2),
    (225, 256, 1, 2),
    (257, 288, 0, 2),
    (289, 320, 3, 1),
    (321, 352, 2, 3),
    (353, 384, 1, 0),
];

fn rows(mode: TransmissionMode) -> &'static [Row] {
    match mode {
        TransmissionMode::I => &ROWS_MODE_I,
        TransmissionMode::II => &ROWS_MODE_II,
        TransmissionMode::III => &ROWS_MODE_III,
        TransmissionMode::IV => &ROWS_MODE_IV,
    }
}

/// Phase of carrier `k` in the reference symbol, or `None` outside the
/// active band.
pub fn reference_phase(mode: TransmissionMode, k: i32) -> Option<f32> {
    rows(mode).iter().find_map(|&(k_min, k_max, i, n)| {
        let (k_min, k_max) = (k_min as i32, k_max as i32);
        if (k_min..=k_max).contains(&k) {
            let h = H[i as usize][(k - k_min) as usize];
            Some(FRAC_PI_2 * (h + n) as f32)
        } else {
            None
        }
    })
}

/// Reference spectrum indexed by FFT bin; unused bins are zero.
pub fn reference_spectrum(params: &ModeParams) -> Vec<Complex32> {
    let mut spectrum = vec![Complex32::new(0.0, 0.0); params.t_u];
    for &(k_min, k_max, i, n) in rows(params.mode) {
        for k in k_min..=k_max {
            let h = H[i as usize][(k - k_min) as usize];
            let phi = FRAC_PI_2 * (h + n) as f32;
            spectrum[carrier_bin(k as i32, params.t_u)] = Complex32::from_polar(1.0, phi);
        }
    }
    spectrum
}

pub struct PhaseReference {
    params: ModeParams,
    spectrum: Vec<Complex32>,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    buf: Vec<Complex32>,
    received: Vec<Complex32>,
    first_carrier: i32,
    /// Pair starts (relative to `first_carrier`) whose reference phase step is 0.
    zero_pairs: Vec<i32>,
    /// Pair starts whose reference phase step is pi.
    pi_pairs: Vec<i32>,
}

impl PhaseReference {
    pub fn new(params: &ModeParams) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(params.t_u);
        let ifft = planner.plan_fft_inverse(params.t_u);
        let spectrum = reference_spectrum(params);

        let first_carrier = -(params.carriers as i32) / 2;
        let pairs = DIFF_LENGTH.min(params.carriers / 2 - 1) as i32;
        let mut zero_pairs = Vec::new();
        let mut pi_pairs = Vec::new();
        for j in 0..pairs {
            let a = spectrum[carrier_bin(first_carrier + j, params.t_u)];
            let b = spectrum[carrier_bin(first_carrier + j + 1, params.t_u)];
            let step = (b * a.conj()).arg().abs();
            if step < 0.1 {
                zero_pairs.push(j);
            } else if step > PI - 0.1 {
                pi_pairs.push(j);
            }
        }

        Self {
            params: *params,
            spectrum,
            fft,
            ifft,
            buf: vec![Complex32::new(0.0, 0.0); params.t_u],
            received: vec![Complex32::new(0.0, 0.0); params.t_u],
            first_carrier,
            zero_pairs,
            pi_pairs,
        }
    }

    pub fn spectrum(&self) -> &[Complex32] {
        &self.spectrum
    }

    /// Locate the start of the useful part of the phase reference symbol.
    ///
    /// `window` must hold at least `t_u` samples starting at the presumed
    /// symbol start (guard interval included). Returns the sample offset of
    /// the correlation peak, nominally `t_g`.
    pub fn find_boundary(&mut self, window: &[Complex32], threshold: f32) -> Result<usize, NoSync> {
        let t_u = self.params.t_u;
        if window.len() < t_u {
            return Err(NoSync { ratio: 0.0 });
        }
        self.buf.copy_from_slice(&window[..t_u]);
        self.fft.process(&mut self.buf);
        for (v, r) in self.buf.iter_mut().zip(&self.spectrum) {
            *v *= r.conj();
        }
        self.ifft.process(&mut self.buf);

        let (ratio, index) = self.correlation_peak();
        if ratio < threshold {
            tracing::trace!("phase reference correlation too weak: {:.2}", ratio);
            return Err(NoSync { ratio });
        }
        Ok(index)
    }

    /// [`find_boundary`](Self::find_boundary) for a signal that may sit a
    /// whole number of carriers off. Every shift within [`SEARCH_RANGE`] is
    /// tried; returns the boundary and the shift with the strongest peak.
    pub fn find_boundary_with_shift(
        &mut self,
        window: &[Complex32],
        threshold: f32,
    ) -> Result<(usize, i16), NoSync> {
        let t_u = self.params.t_u;
        if window.len() < t_u {
            return Err(NoSync { ratio: 0.0 });
        }
        self.received.copy_from_slice(&window[..t_u]);
        self.fft.process(&mut self.received);

        let mut best = (0.0f32, 0usize, 0i32);
        for shift in -SEARCH_RANGE..=SEARCH_RANGE {
            for (bin, r) in self.spectrum.iter().enumerate() {
                let src = (bin as i32 + shift).rem_euclid(t_u as i32) as usize;
                self.buf[bin] = self.received[src] * r.conj();
            }
            self.ifft.process(&mut self.buf);
            let (ratio, index) = self.correlation_peak();
            if ratio > best.0 {
                best = (ratio, index, shift);
            }
        }

        let (ratio, index, shift) = best;
        if ratio < threshold {
            return Err(NoSync { ratio });
        }
        Ok((index, shift as i16))
    }

    /// Peak-to-average ratio of the correlation in `buf` and the peak
    /// position, searched within a quarter symbol of the nominal boundary.
    fn correlation_peak(&self) -> (f32, usize) {
        let t_u = self.params.t_u;
        let sum: f32 = self.buf.iter().map(|v| v.norm()).sum();
        if sum <= f32::EPSILON {
            return (0.0, 0);
        }

        let t_g = self.params.t_g;
        let lo = t_g.saturating_sub(t_u / 4);
        let hi = (t_g + t_u / 4).min(t_u);
        let mut peak = 0.0f32;
        let mut peak_index = lo;
        for (i, v) in self.buf[lo..hi].iter().enumerate() {
            let mag = v.norm();
            if mag > peak {
                peak = mag;
                peak_index = lo + i;
            }
        }
        (peak / (sum / t_u as f32), peak_index)
    }

    /// Estimate the integer carrier offset of a time-aligned reference
    /// symbol (`t_u` samples of the useful part).
    ///
    /// Returns `None` when the zero-step and pi-step searches disagree.
    pub fn estimate_carrier_offset(&mut self, symbol: &[Complex32]) -> Option<i16> {
        let t_u = self.params.t_u;
        if symbol.len() < t_u {
            return None;
        }
        self.buf.copy_from_slice(&symbol[..t_u]);
        let energy: f32 = self.buf.iter().map(|v| v.norm_sqr()).sum();
        if energy <= f32::EPSILON {
            return None;
        }
        self.fft.process(&mut self.buf);

        let step = |buf: &[Complex32], k: i32| -> f32 {
            let a = buf[carrier_bin_wrapped(k, t_u)];
            let b = buf[carrier_bin_wrapped(k + 1, t_u)];
            (b * a.conj()).arg().abs()
        };

        let mut best_zero = (f32::MAX, 0i32);
        let mut best_pi = (f32::MIN, 0i32);
        for shift in -SEARCH_RANGE..=SEARCH_RANGE {
            let base = self.first_carrier + shift;
            let zero: f32 = self.zero_pairs.iter().map(|&j| step(&self.buf, base + j)).sum();
            let pi: f32 = self.pi_pairs.iter().map(|&j| step(&self.buf, base + j)).sum();
            if zero < best_zero.0 {
                best_zero = (zero, shift);
            }
            if pi > best_pi.0 {
                best_pi = (pi, shift);
            }
        }

        if best_zero.1 == best_pi.1 {
            Some(best_zero.1 as i16)
        } else {
            tracing::trace!(
                "carrier offset estimates disagree: {} vs {}",
                best_zero.1,
                best_pi.1
            );
            None
        }
    }
}

/// `carrier_bin` for indices that may run past either band edge.
fn carrier_bin_wrapped(k: i32, t_u: usize) -> usize {
    k.rem_euclid(t_u as i32) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth;

    #[test]
    fn reference_covers_exactly_the_active_carriers() {
        for mode in TransmissionMode::ALL {
            let p = mode.params();
            let spectrum = reference_spectrum(&p);
            let active = spectrum.iter().filter(|v| v.norm() > 0.5).count();
            assert_eq!(active, p.carriers, "mode {}", mode);
            assert_eq!(spectrum[0].norm(), 0.0);
        }
    }

    #[test]
    fn reference_phase_lookup() {
        // k = -768: h0[0] = 0, n = 1.
        let phi = reference_phase(TransmissionMode::I, -768).unwrap();
        assert!((phi - FRAC_PI_2).abs() < 1e-6);
        assert!(reference_phase(TransmissionMode::I, 0).is_none());
        assert!(reference_phase(TransmissionMode::II, 193).is_none());
    }

    #[test]
    fn finds_boundary_of_clean_reference_symbol() {
        for mode in TransmissionMode::ALL {
            let p = mode.params();
            let mut pr = PhaseReference::new(&p);
            let symbol = synth::reference_symbol(&p);
            assert_eq!(pr.find_boundary(&symbol, 3.0), Ok(p.t_g), "mode {}", mode);
        }
    }

    #[test]
    fn finds_boundary_when_window_starts_late() {
        let p = TransmissionMode::II.params();
        let mut pr = PhaseReference::new(&p);
        let symbol = synth::reference_symbol(&p);
        let mut window = symbol[20..].to_vec();
        window.extend(std::iter::repeat(Complex32::new(0.0, 0.0)).take(20));
        assert_eq!(pr.find_boundary(&window, 3.0), Ok(p.t_g - 20));
    }

    #[test]
    fn zero_input_is_no_sync() {
        let p = TransmissionMode::I.params();
        let mut pr = PhaseReference::new(&p);
        let zeros = vec![Complex32::new(0.0, 0.0); p.t_u];
        let err = pr.find_boundary(&zeros, 3.0).unwrap_err();
        assert_eq!(err.ratio, 0.0);
    }

    #[test]
    fn short_window_is_no_sync() {
        let p = TransmissionMode::II.params();
        let mut pr = PhaseReference::new(&p);
        let short = vec![Complex32::new(1.0, 0.0); p.t_u - 1];
        assert!(pr.find_boundary(&short, 3.0).is_err());
    }

    #[test]
    fn estimates_integer_carrier_offset() {
        let p = TransmissionMode::II.params();
        let mut pr = PhaseReference::new(&p);
        let symbol = synth::reference_symbol(&p);
        let useful = &symbol[p.t_g..];
        assert_eq!(pr.estimate_carrier_offset(useful), Some(0));

        for shift in [-7i32, 3, 20] {
            let shifted =
                synth::apply_frequency_offset(useful, (shift * p.carrier_diff) as f32);
            assert_eq!(pr.estimate_carrier_offset(&shifted), Some(shift as i16));
        }
    }

    #[test]
    fn shifted_search_recovers_boundary_and_offset() {
        let p = TransmissionMode::II.params();
        let mut pr = PhaseReference::new(&p);
        let symbol = synth::reference_symbol(&p);
        let shifted = synth::apply_frequency_offset(&symbol, (5 * p.carrier_diff) as f32);
        assert_eq!(pr.find_boundary_with_shift(&shifted, 3.0), Ok((p.t_g, 5)));
        assert_eq!(pr.find_boundary_with_shift(&symbol, 3.0), Ok((p.t_g, 0)));

        let zeros = vec![Complex32::new(0.0, 0.0); p.t_u];
        assert!(pr.find_boundary_with_shift(&zeros, 3.0).is_err());
    }

    #[test]
    fn silent_symbol_has_no_offset_estimate() {
        let p = TransmissionMode::I.params();
        let mut pr = PhaseReference::new(&p);
        let zeros = vec![Complex32::new(0.0, 0.0); p.t_u];
        assert_eq!(pr.estimate_carrier_offset(&zeros), None);
    }
}
