// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receiver event notification system.
//!
//! The synchronisation task raises typed notifications (signal lost,
//! configuration changed, per-frame quality) through registered listeners.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Synchronisation state of the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SyncState {
    /// Estimating the ambient signal level.
    #[default]
    AcquiringLevel,
    /// Scanning for the null-symbol power dip.
    SearchingNull,
    /// Locating the exact phase reference boundary after a dip.
    VerifyingBoundary,
    /// Steady frame loop.
    Synchronized,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcquiringLevel => write!(f, "AcquiringLevel"),
            Self::SearchingNull => write!(f, "SearchingNull"),
            Self::VerifyingBoundary => write!(f, "VerifyingBoundary"),
            Self::Synchronized => write!(f, "Synchronized"),
        }
    }
}

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Trait for components that want to receive receiver events.
///
/// All methods have default no-op implementations, so listeners can
/// selectively override only the events they care about. Methods are called
/// from the synchronisation thread and must not block.
pub trait DabListener: Send + Sync {
    /// Called on every state machine transition.
    fn on_sync_state_change(&self, _old: SyncState, _new: SyncState) {}

    /// Called once per run of consecutive failed null searches.
    fn on_signal_not_found(&self) {}

    /// Called when an established synchronisation is dropped.
    fn on_sync_lost(&self) {}

    /// Called after the ensemble configuration generation swapped.
    fn on_configuration_changed(&self) {}

    /// Called once the ensemble looks completely described.
    fn on_ensemble_loaded(&self) {}

    /// Per-frame FIB CRC results.
    fn on_fic_quality(&self, _good: u32, _bad: u32) {}

    /// Per-frame signal-to-noise estimate in dB.
    fn on_signal_strength(&self, _snr_db: f32) {}

    /// Current total frequency correction in Hz.
    fn on_frequency_offset(&self, _offset_hz: i32) {}

    /// Transmitter identification detected in the null symbol.
    fn on_tii(&self, _main_id: u8, _sub_id: u8) {}
}

/// Manages registered listeners and dispatches events.
pub struct DabEventEmitter {
    listeners: Vec<(ListenerId, Arc<dyn DabListener>)>,
}

impl Default for DabEventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl DabEventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Register a listener to receive events.
    /// Returns an ID that can be used to unregister the listener.
    pub fn register(&mut self, listener: Arc<dyn DabListener>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.push((id, listener));
        id
    }

    pub fn unregister(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn notify_sync_state_change(&self, old: SyncState, new: SyncState) {
        for (_, listener) in &self.listeners {
            listener.on_sync_state_change(old, new);
        }
    }

    pub fn notify_signal_not_found(&self) {
        for (_, listener) in &self.listeners {
            listener.on_signal_not_found();
        }
    }

    pub fn notify_sync_lost(&self) {
        for (_, listener) in &self.listeners {
            listener.on_sync_lost();
        }
    }

    pub fn notify_configuration_changed(&self) {
        for (_, listener) in &self.listeners {
            listener.on_configuration_changed();
        }
    }

    pub fn notify_ensemble_loaded(&self) {
        for (_, listener) in &self.listeners {
            listener.on_ensemble_loaded();
        }
    }

    pub fn notify_fic_quality(&self, good: u32, bad: u32) {
        for (_, listener) in &self.listeners {
            listener.on_fic_quality(good, bad);
        }
    }

    pub fn notify_signal_strength(&self, snr_db: f32) {
        for (_, listener) in &self.listeners {
            listener.on_signal_strength(snr_db);
        }
    }

    pub fn notify_frequency_offset(&self, offset_hz: i32) {
        for (_, listener) in &self.listeners {
            listener.on_frequency_offset(offset_hz);
        }
    }

    pub fn notify_tii(&self, main_id: u8, sub_id: u8) {
        for (_, listener) in &self.listeners {
            listener.on_tii(main_id, sub_id);
        }
    }
}
