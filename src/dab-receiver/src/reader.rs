// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Blocking sample reader in front of a [`SampleSource`].
//!
//! Tracks the average signal magnitude and removes the current frequency
//! correction by mixing every sample with a local oscillator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dab_core::{SampleSource, SourceError};
use num_complex::Complex32;
use thiserror::Error;

const BLOCK_SIZE: usize = 8192;
/// Smoothing factor of the magnitude average.
const LEVEL_ALPHA: f32 = 1e-4;
/// Consecutive device errors tolerated before giving up.
const MAX_DEVICE_ERRORS: u32 = 50;

/// The source stopped or the receiver was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sample reader stopped")]
pub struct ReaderStopped;

pub struct SampleReader {
    source: Box<dyn SampleSource>,
    stop: Arc<AtomicBool>,
    block: Vec<Complex32>,
    pos: usize,
    len: usize,
    level: f32,
    mixer_phase: f64,
    mixer_phase_inc: f64,
    offset_hz: f32,
    sample_rate: u32,
    consumed: u64,
}

impl SampleReader {
    pub fn new(source: Box<dyn SampleSource>, stop: Arc<AtomicBool>) -> Self {
        let sample_rate = source.sample_rate();
        tracing::debug!(
            "sample reader: {} Hz, {}-bit source",
            sample_rate,
            source.bit_depth()
        );
        Self {
            source,
            stop,
            block: vec![Complex32::new(0.0, 0.0); BLOCK_SIZE],
            pos: 0,
            len: 0,
            level: 0.0,
            mixer_phase: 0.0,
            mixer_phase_inc: 0.0,
            offset_hz: 0.0,
            sample_rate,
            consumed: 0,
        }
    }

    /// Average sample magnitude.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Samples handed out so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn offset_hz(&self) -> f32 {
        self.offset_hz
    }

    /// Shift the incoming signal down by `offset_hz` from now on.
    pub fn set_offset_hz(&mut self, offset_hz: f32) {
        self.offset_hz = offset_hz;
        self.mixer_phase_inc = if self.sample_rate == 0 {
            0.0
        } else {
            2.0 * std::f64::consts::PI * offset_hz as f64 / self.sample_rate as f64
        };
    }

    /// Drop buffered samples here and in the device.
    pub fn flush(&mut self) {
        self.pos = 0;
        self.len = 0;
        self.source.flush();
    }

    fn refill(&mut self) -> Result<(), ReaderStopped> {
        let mut errors = 0u32;
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Err(ReaderStopped);
            }
            match self.source.read_into(&mut self.block) {
                Ok(0) => std::thread::sleep(Duration::from_millis(1)),
                Ok(n) => {
                    self.pos = 0;
                    self.len = n;
                    return Ok(());
                }
                Err(SourceError::Stopped) => return Err(ReaderStopped),
                Err(e) => {
                    errors += 1;
                    if errors >= MAX_DEVICE_ERRORS {
                        tracing::error!("{}; giving up after {} attempts", e, errors);
                        return Err(ReaderStopped);
                    }
                    tracing::warn!("{}; retrying", e);
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }
    }

    pub fn next_sample(&mut self) -> Result<Complex32, ReaderStopped> {
        if self.pos == self.len {
            self.refill()?;
        }
        let raw = self.block[self.pos];
        self.pos += 1;
        self.consumed += 1;

        self.level = LEVEL_ALPHA * raw.norm() + (1.0 - LEVEL_ALPHA) * self.level;

        if self.mixer_phase_inc == 0.0 {
            return Ok(raw);
        }
        let (sin, cos) = self.mixer_phase.sin_cos();
        let lo = Complex32::new(cos as f32, -(sin as f32));
        self.mixer_phase += self.mixer_phase_inc;
        if self.mixer_phase >= std::f64::consts::TAU {
            self.mixer_phase -= std::f64::consts::TAU;
        } else if self.mixer_phase < -std::f64::consts::TAU {
            self.mixer_phase += std::f64::consts::TAU;
        }
        Ok(raw * lo)
    }

    /// Fill `out` completely.
    pub fn read(&mut self, out: &mut [Complex32]) -> Result<(), ReaderStopped> {
        for s in out.iter_mut() {
            *s = self.next_sample()?;
        }
        Ok(())
    }

    /// Consume and drop `n` samples.
    pub fn skip(&mut self, n: usize) -> Result<(), ReaderStopped> {
        for _ in 0..n {
            self.next_sample()?;
        }
        Ok(())
    }
}
