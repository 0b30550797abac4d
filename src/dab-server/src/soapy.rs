// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! SoapySDR device source.

use dab_core::{SampleSource, SourceError, SAMPLE_RATE_HZ};
use num_complex::Complex32;
use soapysdr::{Device, Direction, ErrorCode, RxStream};

use crate::config::SourceConfig;

/// Analogue filter width covering one DAB ensemble.
const BANDWIDTH_HZ: f64 = 1_536_000.0;
const READ_TIMEOUT_US: i64 = 100_000;

pub struct SoapySource {
    _device: Device,
    stream: RxStream<Complex32>,
}

impl SoapySource {
    pub fn open(cfg: &SourceConfig) -> Result<Self, String> {
        tracing::info!("Initializing SoapySDR device with args: {}", cfg.args);

        let device = Device::new(cfg.args.as_str()).map_err(|e| {
            format!(
                "Failed to open SoapySDR device (args={}): {}",
                cfg.args, e
            )
        })?;

        let rate = f64::from(SAMPLE_RATE_HZ);
        device
            .set_sample_rate(Direction::Rx, 0, rate)
            .map_err(|e| format!("Failed to set sample rate: {}", e))?;
        let actual_rate = device.sample_rate(Direction::Rx, 0).unwrap_or(rate);
        if (actual_rate - rate).abs() > 1.0 {
            return Err(format!(
                "device runs at {} Hz, the receiver needs {} Hz",
                actual_rate, rate
            ));
        }

        let freq = cfg.frequency_hz as f64;
        device
            .set_frequency(Direction::Rx, 0, freq, ())
            .map_err(|e| format!("Failed to set frequency: {}", e))?;
        let actual_freq = device.frequency(Direction::Rx, 0).unwrap_or(freq);
        tracing::info!(
            "Set center frequency to {} Hz (actual: {} Hz)",
            freq,
            actual_freq
        );

        if let Err(e) = device.set_bandwidth(Direction::Rx, 0, BANDWIDTH_HZ) {
            tracing::warn!("Failed to set bandwidth: {}; continuing with default", e);
        }

        if let Err(e) = device.set_gain(Direction::Rx, 0, cfg.gain_db) {
            tracing::warn!("Failed to set gain: {}; using device default", e);
        } else {
            let actual_gain = device.gain(Direction::Rx, 0).unwrap_or(cfg.gain_db);
            tracing::info!("Set gain to {} dB (actual: {} dB)", cfg.gain_db, actual_gain);
        }

        let mut stream = device
            .rx_stream::<Complex32>(&[0])
            .map_err(|e| format!("Failed to open RX stream: {}", e))?;
        stream
            .activate(None)
            .map_err(|e| format!("Failed to activate RX stream: {}", e))?;

        Ok(Self {
            _device: device,
            stream,
        })
    }
}

impl SampleSource for SoapySource {
    fn read_into(&mut self, buf: &mut [Complex32]) -> Result<usize, SourceError> {
        match self.stream.read(&mut [buf], READ_TIMEOUT_US) {
            Ok(n) => Ok(n),
            Err(e) if e.code == ErrorCode::Timeout || e.code == ErrorCode::Overflow => {
                tracing::trace!("SoapySDR read: {}", e);
                Ok(0)
            }
            Err(e) => Err(SourceError::Device(e.to_string())),
        }
    }

    fn flush(&mut self) {
        let mut scratch = vec![Complex32::new(0.0, 0.0); 16_384];
        while let Ok(n) = self.stream.read(&mut [&mut scratch[..]], 0) {
            if n == 0 {
                break;
            }
        }
    }

    fn bit_depth(&self) -> u32 {
        16
    }
}

impl Drop for SoapySource {
    fn drop(&mut self) {
        if let Err(e) = self.stream.deactivate(None) {
            tracing::warn!("Failed to deactivate RX stream: {}", e);
        }
    }
}
