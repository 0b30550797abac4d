// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use dab_core::TransmissionMode;
use serde::{Deserialize, Serialize};

/// Tuning of the synchronisation state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub mode: TransmissionMode,
    /// Peak-to-average ratio the first boundary check must reach. Tracking
    /// checks use three times this value.
    pub threshold: f32,
    /// Failed null searches before "signal not found" is raised.
    pub null_search_attempts: u32,
    /// Consecutive failed boundary checks that drop synchronisation.
    pub resync_failures: u32,
    /// Integer carrier offset correction while the FIC is not decoding.
    pub coarse_correction: bool,
    pub max_coarse_offset_hz: i32,
    /// Loop gain of the fractional offset tracker.
    pub fine_gain: f32,
    pub tii_enabled: bool,
    /// Null symbols averaged per TII decision.
    pub tii_frames: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            mode: TransmissionMode::I,
            threshold: 3.0,
            null_search_attempts: 8,
            resync_failures: 3,
            coarse_correction: true,
            max_coarse_offset_hz: 35_000,
            fine_gain: 0.1,
            tii_enabled: false,
            tii_frames: 16,
        }
    }
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(format!("[receiver].threshold must be positive, got {}", self.threshold));
        }
        if self.null_search_attempts == 0 {
            return Err("[receiver].null_search_attempts must be at least 1".to_string());
        }
        if self.resync_failures == 0 {
            return Err("[receiver].resync_failures must be at least 1".to_string());
        }
        if self.max_coarse_offset_hz < 0 {
            return Err("[receiver].max_coarse_offset_hz must not be negative".to_string());
        }
        if !(0.0..=1.0).contains(&self.fine_gain) {
            return Err(format!("[receiver].fine_gain must be within 0..=1, got {}", self.fine_gain));
        }
        if self.tii_enabled && self.tii_frames == 0 {
            return Err("[receiver].tii_frames must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = ReceiverConfig::default();
        assert_eq!(cfg.mode, TransmissionMode::I);
        assert_eq!(cfg.null_search_attempts, 8);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let cfg = ReceiverConfig {
            fine_gain: 1.5,
            ..Default::default()
        };
        assert!(cfg.validate().unwrap_err().contains("fine_gain"));

        let cfg = ReceiverConfig {
            resync_failures: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
