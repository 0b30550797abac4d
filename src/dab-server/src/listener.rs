// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receiver event logging and subscribed sub-channel output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use dab_core::{DabListener, SyncState};
use dab_receiver::CuSink;
use tracing::{debug, info, warn};

/// Frames between FIC quality log lines.
const QUALITY_LOG_FRAMES: u32 = 50;

/// Logs receiver events and keeps the latest per-frame figures.
#[derive(Default)]
pub struct LogListener {
    frames: AtomicU32,
    fibs_ok: AtomicU64,
    fibs_bad: AtomicU64,
    snr_centi_db: AtomicU32,
    synced: AtomicBool,
}

impl LogListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Relaxed)
    }

    /// Valid and failed FIBs since start.
    pub fn fib_totals(&self) -> (u64, u64) {
        (
            self.fibs_ok.load(Ordering::Relaxed),
            self.fibs_bad.load(Ordering::Relaxed),
        )
    }

    pub fn snr_db(&self) -> f32 {
        self.snr_centi_db.load(Ordering::Relaxed) as i32 as f32 / 100.0
    }
}

impl DabListener for LogListener {
    fn on_sync_state_change(&self, old: SyncState, new: SyncState) {
        debug!("sync {} -> {}", old, new);
        let synced = new == SyncState::Synchronized;
        if synced != self.synced.swap(synced, Ordering::Relaxed) && synced {
            info!("synchronised");
        }
    }

    fn on_signal_not_found(&self) {
        warn!("no DAB signal found");
    }

    fn on_sync_lost(&self) {
        warn!("synchronisation lost, searching");
    }

    fn on_configuration_changed(&self) {
        info!("ensemble reconfigured");
    }

    fn on_ensemble_loaded(&self) {
        info!("ensemble loaded");
    }

    fn on_fic_quality(&self, good: u32, bad: u32) {
        self.fibs_ok.fetch_add(u64::from(good), Ordering::Relaxed);
        self.fibs_bad.fetch_add(u64::from(bad), Ordering::Relaxed);
        let frames = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if frames % QUALITY_LOG_FRAMES == 0 {
            let (ok, failed) = self.fib_totals();
            info!(
                "FIC: {} of {} FIBs valid, SNR {:.1} dB",
                ok,
                ok + failed,
                self.snr_db()
            );
        }
    }

    fn on_signal_strength(&self, snr_db: f32) {
        let centi = (snr_db * 100.0).round() as i32;
        self.snr_centi_db.store(centi as u32, Ordering::Relaxed);
    }

    fn on_frequency_offset(&self, offset_hz: i32) {
        debug!("frequency offset {} Hz", offset_hz);
    }

    fn on_tii(&self, main_id: u8, sub_id: u8) {
        info!("TII main {} sub {}", main_id, sub_id);
    }
}

/// Writes a sub-channel's soft bits to a file as little-endian i16.
pub struct DumpSink {
    out: Mutex<BufWriter<File>>,
    failed: AtomicBool,
    written: AtomicU64,
}

impl DumpSink {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        info!("writing sub-channel bits to {}", path.display());
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
            failed: AtomicBool::new(false),
            written: AtomicU64::new(0),
        })
    }

    /// CIF slices written so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn flush(&self) {
        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = out.flush() {
            warn!("flushing dump file failed: {}", e);
        }
    }
}

impl CuSink for DumpSink {
    fn put(&self, bits: &[i16]) {
        if self.failed.load(Ordering::Relaxed) {
            return;
        }
        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = bits
            .iter()
            .try_for_each(|b| out.write_all(&b.to_le_bytes()));
        match result {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("writing dump file failed, output disabled: {}", e);
                self.failed.store(true, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_fibs_and_sync() {
        let l = LogListener::new();
        l.on_fic_quality(3, 0);
        l.on_fic_quality(1, 2);
        assert_eq!(l.fib_totals(), (4, 2));

        l.on_sync_state_change(SyncState::VerifyingBoundary, SyncState::Synchronized);
        assert!(l.is_synced());
        l.on_sync_state_change(SyncState::Synchronized, SyncState::SearchingNull);
        assert!(!l.is_synced());

        l.on_signal_strength(-3.5);
        assert!((l.snr_db() + 3.5).abs() < 1e-3);
    }

    #[test]
    fn dump_sink_writes_little_endian() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub.bin");
        let sink = DumpSink::create(&path).unwrap();
        sink.put(&[1, -2]);
        sink.put(&[0x0102]);
        sink.flush();
        assert_eq!(sink.written(), 2);
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 0, 0xfe, 0xff, 0x02, 0x01]);
    }
}
