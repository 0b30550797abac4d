// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod events;
pub mod mode;
pub mod source;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Baseband sample rate every transmission mode is specified against.
pub const SAMPLE_RATE_HZ: u32 = 2_048_000;

pub use events::{DabEventEmitter, DabListener, ListenerId, SyncState};
pub use mode::{ModeParams, TransmissionMode};
pub use source::{BufferSource, SampleSource, SilentSource, SourceError};
