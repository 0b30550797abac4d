// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Fast Information Channel decoding and ensemble configuration.

pub mod bits;
pub mod charset;
pub mod crc;
pub mod encode;
pub mod ensemble;
pub mod fic;
pub mod fig;
pub mod prbs;
pub mod protection;
pub mod puncture;
pub mod viterbi;

pub use crc::FIB_BYTES;
pub use ensemble::{
    label_matches, AudioDescriptor, EnsembleConfig, EnsembleDecoder, EnsembleEvent,
    EnsembleSummary, PacketDescriptor, ServiceOrder, SharedEnsemble,
};
pub use fic::{FibSink, FicDecoder, FicState, FicStats};
pub use protection::Protection;
