// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! OFDM layer of the DAB receiver: phase reference correlation, frequency
//! de-interleaving, differential demodulation and transmitter identification.

pub mod decoder;
pub mod interleaver;
pub mod phase_ref;
pub mod synth;
pub mod tii;

pub use decoder::OfdmDecoder;
pub use interleaver::{carrier_bin, FrequencyInterleaver};
pub use phase_ref::{NoSync, PhaseReference};
pub use tii::TiiDetector;
