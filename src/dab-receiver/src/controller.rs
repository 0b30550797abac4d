// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Frame synchronisation state machine.
//!
//! One transition function per [`SyncState`]:
//!
//! - `AcquiringLevel`: discard a fifth of a frame so the level estimate settles.
//! - `SearchingNull`: look for the power dip of the null symbol and its end.
//! - `VerifyingBoundary`: correlate against the phase reference to find the
//!   exact start of the frame.
//! - `Synchronized`: decode one frame, then check the next frame's boundary.

use std::collections::VecDeque;
use std::f32::consts::TAU;

use dab_core::{DabEventEmitter, ModeParams, SyncState};
use dab_fic::{EnsembleDecoder, EnsembleEvent, FicDecoder, FicStats};
use dab_ofdm::{OfdmDecoder, PhaseReference, TiiDetector};
use num_complex::Complex32;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::ReceiverConfig;
use crate::msc::MscMessage;
use crate::reader::{ReaderStopped, SampleReader};

/// Samples in the sliding magnitude window of the null search.
const NULL_WINDOW: usize = 50;
/// FIC quality (percent) below which coarse correction keeps running.
const COARSE_QUALITY: u8 = 50;

/// Frequency correction applied to the incoming signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FrequencyOffset {
    /// Whole carrier spacings, in Hz.
    pub coarse_hz: i32,
    /// Residual within half a carrier spacing, in Hz.
    pub fine_hz: f32,
}

impl FrequencyOffset {
    pub fn total_hz(&self) -> f32 {
        self.coarse_hz as f32 + self.fine_hz
    }

    /// Move whole carrier spacings out of `fine_hz` so it stays within
    /// `[-carrier_diff / 2, carrier_diff / 2)`. `coarse_hz` never leaves
    /// `[-max_coarse_hz, max_coarse_hz]`.
    fn fold(&mut self, carrier_diff: i32, max_coarse_hz: i32) {
        if !self.fine_hz.is_finite() {
            self.fine_hz = 0.0;
            return;
        }
        let spacing = carrier_diff as f32;
        while self.fine_hz >= spacing / 2.0 {
            self.fine_hz -= spacing;
            self.coarse_hz += carrier_diff;
        }
        while self.fine_hz < -spacing / 2.0 {
            self.fine_hz += spacing;
            self.coarse_hz -= carrier_diff;
        }
        self.coarse_hz = self.coarse_hz.clamp(-max_coarse_hz, max_coarse_hz);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub frames: u64,
    pub sync_losses: u64,
    pub signal_not_found: u64,
}

pub struct SyncController {
    params: ModeParams,
    config: ReceiverConfig,
    reader: SampleReader,
    phase_ref: PhaseReference,
    ofdm: OfdmDecoder,
    fic: FicDecoder,
    ensemble: EnsembleDecoder,
    tii: Option<TiiDetector>,
    emitter: DabEventEmitter,
    msc_tx: Option<mpsc::Sender<MscMessage>>,
    state: SyncState,
    offset: FrequencyOffset,
    reported_offset: Option<i32>,
    null_failures: u32,
    check_failures: u32,
    stats: SyncStats,
    history: VecDeque<Complex32>,
    history_sum: f32,
    window: Vec<Complex32>,
    prs: Vec<Complex32>,
    symbol: Vec<Complex32>,
    null: Vec<Complex32>,
    soft: Vec<i16>,
}

impl SyncController {
    pub fn new(
        config: ReceiverConfig,
        reader: SampleReader,
        ensemble: EnsembleDecoder,
        emitter: DabEventEmitter,
    ) -> Self {
        let params = config.mode.params();
        let tii = if config.tii_enabled {
            let detector = TiiDetector::new(&params, config.tii_frames);
            if !detector.is_supported() {
                tracing::warn!("TII detection is only available in mode I");
            }
            detector.is_supported().then_some(detector)
        } else {
            None
        };
        let zero = Complex32::new(0.0, 0.0);
        Self {
            params,
            reader,
            phase_ref: PhaseReference::new(&params),
            ofdm: OfdmDecoder::new(&params),
            fic: FicDecoder::new(&params),
            ensemble,
            tii,
            emitter,
            msc_tx: None,
            state: SyncState::default(),
            offset: FrequencyOffset::default(),
            reported_offset: None,
            null_failures: 0,
            check_failures: 0,
            stats: SyncStats::default(),
            history: VecDeque::with_capacity(NULL_WINDOW),
            history_sum: 0.0,
            window: vec![zero; params.t_u],
            prs: vec![zero; params.t_u],
            symbol: vec![zero; params.t_s],
            null: vec![zero; params.t_null],
            soft: vec![0; params.bits_per_symbol()],
            config,
        }
    }

    /// Hand MSC symbols to `tx` from now on.
    pub fn with_msc(mut self, tx: mpsc::Sender<MscMessage>) -> Self {
        self.msc_tx = Some(tx);
        self
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn offset(&self) -> FrequencyOffset {
        self.offset
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn fic_stats(&self) -> FicStats {
        self.fic.stats()
    }

    pub fn ensemble(&self) -> &EnsembleDecoder {
        &self.ensemble
    }

    /// Run until the source stops or a stop is requested.
    pub fn run(mut self) -> SyncStats {
        tracing::info!("synchronisation started in mode {}", self.params.mode);
        while self.step().is_ok() {}
        tracing::info!(
            "synchronisation stopped after {} frames ({} sync losses)",
            self.stats.frames,
            self.stats.sync_losses
        );
        self.stats
    }

    /// Perform the work of the current state once.
    pub fn step(&mut self) -> Result<(), ReaderStopped> {
        if self.reader.stop_requested() {
            return Err(ReaderStopped);
        }
        match self.state {
            SyncState::AcquiringLevel => self.acquire_level(),
            SyncState::SearchingNull => self.search_null(),
            SyncState::VerifyingBoundary => self.verify_boundary(),
            SyncState::Synchronized => self.process_frame(),
        }
    }

    fn set_state(&mut self, state: SyncState) {
        if state == self.state {
            return;
        }
        tracing::debug!("sync state {} -> {}", self.state, state);
        self.emitter.notify_sync_state_change(self.state, state);
        self.state = state;
    }

    fn acquire_level(&mut self) -> Result<(), ReaderStopped> {
        self.reader.skip(self.params.t_f / 5)?;
        tracing::debug!("signal level {:.4}", self.reader.level());
        self.set_state(SyncState::SearchingNull);
        Ok(())
    }

    fn push_history(&mut self, sample: Complex32) {
        if self.history.len() == NULL_WINDOW {
            if let Some(old) = self.history.pop_front() {
                self.history_sum -= old.norm();
            }
        }
        self.history.push_back(sample);
        self.history_sum += sample.norm();
    }

    /// Mean magnitude over the window, once it is full.
    fn history_mean(&self) -> Option<f32> {
        (self.history.len() == NULL_WINDOW).then(|| self.history_sum.max(0.0) / NULL_WINDOW as f32)
    }

    fn search_null(&mut self) -> Result<(), ReaderStopped> {
        self.history.clear();
        self.history_sum = 0.0;

        let mut dip = false;
        for _ in 0..self.params.t_f {
            let sample = self.reader.next_sample()?;
            self.push_history(sample);
            if self
                .history_mean()
                .is_some_and(|mean| mean < 0.5 * self.reader.level())
            {
                dip = true;
                break;
            }
        }

        if dip {
            for _ in 0..self.params.t_null + self.params.t_s {
                let sample = self.reader.next_sample()?;
                self.push_history(sample);
                if self
                    .history_mean()
                    .is_some_and(|mean| mean > 0.75 * self.reader.level())
                {
                    self.null_failures = 0;
                    self.set_state(SyncState::VerifyingBoundary);
                    return Ok(());
                }
            }
        }

        self.null_failures += 1;
        if self.null_failures >= self.config.null_search_attempts {
            tracing::warn!("no null symbol in {} attempts", self.null_failures);
            self.stats.signal_not_found += 1;
            self.emitter.notify_signal_not_found();
            self.null_failures = 0;
        }
        Ok(())
    }

    fn verify_boundary(&mut self) -> Result<(), ReaderStopped> {
        let keep = self.history.len().min(self.params.t_u);
        for (dst, src) in self.window.iter_mut().zip(self.history.iter()) {
            *dst = *src;
        }
        self.reader.read(&mut self.window[keep..])?;

        // Without a working FIC the signal may sit whole carriers off, which
        // hides the plain correlation peak.
        let searching = self.config.coarse_correction && self.fic.quality() < COARSE_QUALITY;
        let found = if searching {
            self.phase_ref
                .find_boundary_with_shift(&self.window, self.config.threshold)
        } else {
            self.phase_ref
                .find_boundary(&self.window, self.config.threshold)
                .map(|start| (start, 0))
        };

        match found {
            Ok((start, 0)) => {
                self.check_failures = 0;
                self.align_reference(start)?;
                self.set_state(SyncState::Synchronized);
            }
            Ok((_, shift)) => {
                tracing::debug!("phase reference found {} carriers off", shift);
                self.adjust_coarse(shift);
                self.set_state(SyncState::SearchingNull);
            }
            Err(e) => {
                tracing::debug!("boundary not verified: {}", e);
                self.set_state(SyncState::SearchingNull);
            }
        }
        Ok(())
    }

    /// Fill `prs` with the useful part of the phase reference, which starts
    /// at `window[start]`.
    fn align_reference(&mut self, start: usize) -> Result<(), ReaderStopped> {
        let have = self.params.t_u - start;
        self.prs[..have].copy_from_slice(&self.window[start..]);
        self.reader.read(&mut self.prs[have..])
    }

    /// Returns true when the correction changed.
    fn adjust_coarse(&mut self, shift: i16) -> bool {
        let max = self.config.max_coarse_offset_hz;
        let coarse = (self.offset.coarse_hz + i32::from(shift) * self.params.carrier_diff)
            .clamp(-max, max);
        if coarse == self.offset.coarse_hz {
            return false;
        }
        tracing::debug!(
            "coarse frequency correction {} Hz -> {} Hz",
            self.offset.coarse_hz,
            coarse
        );
        self.offset.coarse_hz = coarse;
        self.reader.set_offset_hz(self.offset.total_hz());
        true
    }

    fn process_frame(&mut self) -> Result<(), ReaderStopped> {
        let p = self.params;
        self.ofdm.process_reference(&self.prs);
        if self.config.coarse_correction && self.fic.quality() < COARSE_QUALITY {
            if let Some(shift) = self.phase_ref.estimate_carrier_offset(&self.prs) {
                self.adjust_coarse(shift);
            }
        }

        let mut drift = Complex32::new(0.0, 0.0);
        for l in 1..p.symbols_per_frame {
            self.reader.read(&mut self.symbol)?;
            for i in 0..p.t_g {
                drift += self.symbol[p.t_u + i] * self.symbol[i].conj();
            }
            self.ofdm.decode_symbol(&self.symbol[p.t_g..], &mut self.soft);
            if l <= p.fic_symbols {
                self.fic.process_symbol(l - 1, &self.soft, &mut self.ensemble);
            } else {
                self.send_msc(MscMessage::Symbol {
                    index: l - 1 - p.fic_symbols,
                    bits: self.soft.clone(),
                });
            }
        }
        self.end_of_frame(drift);

        self.reader.read(&mut self.null)?;
        if let Some(tii) = self.tii.as_mut() {
            if let Some((main_id, sub_id)) = tii.push_null(&self.null) {
                tracing::debug!("TII main {} sub {}", main_id, sub_id);
                self.emitter.notify_tii(main_id, sub_id);
            }
        }
        self.track_boundary()
    }

    fn end_of_frame(&mut self, drift: Complex32) {
        let p = self.params;
        if drift.norm_sqr() > 0.0 {
            let error_hz = drift.arg() / TAU * p.carrier_diff as f32;
            self.offset.fine_hz += self.config.fine_gain * error_hz;
            self.offset.fold(p.carrier_diff, self.config.max_coarse_offset_hz);
            self.reader.set_offset_hz(self.offset.total_hz());
        }
        self.stats.frames += 1;

        let (good, bad) = self.fic.last_frame();
        self.emitter.notify_fic_quality(good, bad);
        self.emitter.notify_signal_strength(self.ofdm.snr_db());
        let total = self.offset.total_hz().round() as i32;
        if self.reported_offset != Some(total) {
            self.reported_offset = Some(total);
            self.emitter.notify_frequency_offset(total);
        }

        self.ensemble.publish();
        for event in self.ensemble.take_events() {
            match event {
                EnsembleEvent::ConfigurationChanged => {
                    self.emitter.notify_configuration_changed();
                    self.send_msc(MscMessage::Reconfigured);
                }
                EnsembleEvent::EnsembleLoaded => self.emitter.notify_ensemble_loaded(),
            }
        }
    }

    /// Check the boundary of the next frame, starting half a guard interval
    /// before the end of the null symbol just read.
    fn track_boundary(&mut self) -> Result<(), ReaderStopped> {
        let p = self.params;
        let back = p.t_g / 2;
        self.window[..back].copy_from_slice(&self.null[p.t_null - back..]);
        self.reader.read(&mut self.window[back..])?;

        let start = match self
            .phase_ref
            .find_boundary(&self.window, 3.0 * self.config.threshold)
        {
            Ok(start) => {
                self.check_failures = 0;
                start
            }
            Err(e) => {
                self.check_failures += 1;
                tracing::debug!(
                    "boundary check failed ({} in a row): {}",
                    self.check_failures,
                    e
                );
                if self.check_failures >= self.config.resync_failures {
                    self.lose_sync();
                    return Ok(());
                }
                back + p.t_g
            }
        };
        self.align_reference(start)
    }

    fn lose_sync(&mut self) {
        tracing::warn!(
            "synchronisation lost after {} failed boundary checks",
            self.check_failures
        );
        self.check_failures = 0;
        self.stats.sync_losses += 1;
        self.emitter.notify_sync_lost();
        self.fic.reset();
        self.send_msc(MscMessage::Reset);
        self.set_state(SyncState::SearchingNull);
    }

    fn send_msc(&mut self, msg: MscMessage) {
        let Some(tx) = &self.msc_tx else {
            return;
        };
        if tx.blocking_send(msg).is_err() {
            tracing::warn!("MSC consumer gone, MSC output disabled");
            self.msc_tx = None;
        }
    }
}
