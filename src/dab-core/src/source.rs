// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sample source abstraction.
//!
//! One implementation exists per backing device (file capture, SDR driver).
//! The receiver only needs blocking reads of normalised complex samples.

use num_complex::Complex32;
use thiserror::Error;

use crate::SAMPLE_RATE_HZ;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The device was stopped or the capture ran out. Not a failure.
    #[error("sample source stopped")]
    Stopped,
    #[error("sample source I/O error: {0}")]
    Io(String),
    #[error("sample source device error: {0}")]
    Device(String),
}

/// Abstraction over any baseband sample source (SDR device, capture file, mock).
pub trait SampleSource: Send + 'static {
    /// Read the next block of samples into `buf`, blocking until data is
    /// available. Samples are unit-scale regardless of device bit depth.
    /// Returns the number of samples written.
    fn read_into(&mut self, buf: &mut [Complex32]) -> Result<usize, SourceError>;

    /// Drop any samples buffered inside the device.
    fn flush(&mut self) {}

    /// Native sample width of the device in bits.
    fn bit_depth(&self) -> u32;

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE_HZ
    }
}

/// Source that produces silence forever. Used when no hardware is present.
pub struct SilentSource;

impl SampleSource for SilentSource {
    fn read_into(&mut self, buf: &mut [Complex32]) -> Result<usize, SourceError> {
        buf.fill(Complex32::new(0.0, 0.0));
        Ok(buf.len())
    }

    fn bit_depth(&self) -> u32 {
        8
    }
}

/// Plays back an in-memory sample buffer, then reports `Stopped`.
pub struct BufferSource {
    samples: Vec<Complex32>,
    pos: usize,
    chunk: usize,
}

impl BufferSource {
    pub fn new(samples: Vec<Complex32>) -> Self {
        Self {
            samples,
            pos: 0,
            chunk: 4096,
        }
    }

    /// Limit each read to `chunk` samples to exercise partial reads.
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.pos
    }
}

impl SampleSource for BufferSource {
    fn read_into(&mut self, buf: &mut [Complex32]) -> Result<usize, SourceError> {
        let n = buf.len().min(self.chunk).min(self.remaining());
        if n == 0 {
            return Err(SourceError::Stopped);
        }
        buf[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn flush(&mut self) {
        tracing::debug!("BufferSource: flush ignored ({} samples left)", self.remaining());
    }

    fn bit_depth(&self) -> u32 {
        32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_source_fills_zeros() {
        let mut src = SilentSource;
        let mut buf = vec![Complex32::new(1.0, 1.0); 64];
        assert_eq!(src.read_into(&mut buf), Ok(64));
        assert!(buf.iter().all(|s| s.re == 0.0 && s.im == 0.0));
    }

    #[test]
    fn buffer_source_reads_in_chunks_then_stops() {
        let samples: Vec<Complex32> = (0..10).map(|i| Complex32::new(i as f32, 0.0)).collect();
        let mut src = BufferSource::new(samples).with_chunk(4);
        let mut buf = vec![Complex32::new(0.0, 0.0); 8];
        assert_eq!(src.read_into(&mut buf), Ok(4));
        assert_eq!(buf[3].re, 3.0);
        assert_eq!(src.read_into(&mut buf), Ok(4));
        assert_eq!(src.read_into(&mut buf), Ok(2));
        assert_eq!(buf[1].re, 9.0);
        assert_eq!(src.read_into(&mut buf), Err(SourceError::Stopped));
    }
}
