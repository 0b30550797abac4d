// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-transmission-mode frame geometry.
//!
//! All durations are in samples at 2.048 MS/s. A frame is one null symbol
//! followed by `symbols_per_frame` OFDM symbols; the first of those is the
//! phase reference, then the FIC symbols, then the MSC symbols.
//!
//! ```text
//! | T_null | PRS | FIC * n | MSC * m |
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bits in one Common Interleaved Frame, identical for every mode.
pub const CIF_BITS: usize = 55_296;
/// Bits in one capacity unit.
pub const CU_BITS: usize = 64;
/// Capacity units in one CIF.
pub const CUS_PER_CIF: usize = CIF_BITS / CU_BITS;

/// DAB transmission mode. Serialised as its number, 1 to 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum TransmissionMode {
    #[default]
    I,
    II,
    III,
    IV,
}

impl TransmissionMode {
    pub const ALL: [TransmissionMode; 4] = [
        TransmissionMode::I,
        TransmissionMode::II,
        TransmissionMode::III,
        TransmissionMode::IV,
    ];

    pub fn params(self) -> ModeParams {
        ModeParams::for_mode(self)
    }
}

impl TryFrom<u8> for TransmissionMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::I),
            2 => Ok(Self::II),
            3 => Ok(Self::III),
            4 => Ok(Self::IV),
            other => Err(format!("unknown transmission mode {}", other)),
        }
    }
}

impl From<TransmissionMode> for u8 {
    fn from(mode: TransmissionMode) -> Self {
        match mode {
            TransmissionMode::I => 1,
            TransmissionMode::II => 2,
            TransmissionMode::III => 3,
            TransmissionMode::IV => 4,
        }
    }
}

impl fmt::Display for TransmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I => write!(f, "I"),
            Self::II => write!(f, "II"),
            Self::III => write!(f, "III"),
            Self::IV => write!(f, "IV"),
        }
    }
}

/// Immutable constants of one transmission mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeParams {
    pub mode: TransmissionMode,
    /// Useful symbol length (FFT size).
    pub t_u: usize,
    /// Guard interval (cyclic prefix) length.
    pub t_g: usize,
    /// Total symbol length, `t_u + t_g`.
    pub t_s: usize,
    /// Null symbol length.
    pub t_null: usize,
    /// Frame length including the null symbol.
    pub t_f: usize,
    /// OFDM symbols per frame, phase reference included.
    pub symbols_per_frame: usize,
    /// Active carriers, DC excluded.
    pub carriers: usize,
    /// Carrier spacing in Hz.
    pub carrier_diff: i32,
    /// Symbols after the phase reference that carry the FIC.
    pub fic_symbols: usize,
    /// Information bits per FIC convolutional block.
    pub fic_block_bits: usize,
    /// FIC convolutional blocks per frame.
    pub fic_blocks_per_frame: usize,
    /// CIFs carried by the MSC symbols of one frame.
    pub cifs_per_frame: usize,
}

impl ModeParams {
    pub fn for_mode(mode: TransmissionMode) -> Self {
        let (t_u, t_g, t_null, symbols_per_frame, carriers, carrier_diff) = match mode {
            TransmissionMode::I => (2048, 504, 2656, 76, 1536, 1000),
            TransmissionMode::II => (512, 126, 664, 76, 384, 4000),
            TransmissionMode::III => (256, 63, 345, 153, 192, 8000),
            TransmissionMode::IV => (1024, 252, 1328, 76, 768, 2000),
        };
        let (fic_symbols, fic_block_bits, fic_blocks_per_frame, cifs_per_frame) = match mode {
            TransmissionMode::I => (3, 768, 4, 4),
            TransmissionMode::II => (3, 768, 1, 1),
            TransmissionMode::III => (8, 1024, 1, 1),
            TransmissionMode::IV => (3, 768, 2, 2),
        };
        let t_s = t_u + t_g;
        Self {
            mode,
            t_u,
            t_g,
            t_s,
            t_null,
            t_f: t_null + symbols_per_frame * t_s,
            symbols_per_frame,
            carriers,
            carrier_diff,
            fic_symbols,
            fic_block_bits,
            fic_blocks_per_frame,
            cifs_per_frame,
        }
    }

    /// Soft bits produced per data symbol (two per carrier).
    pub fn bits_per_symbol(&self) -> usize {
        2 * self.carriers
    }

    pub fn msc_symbols(&self) -> usize {
        self.symbols_per_frame - 1 - self.fic_symbols
    }

    /// Coded (punctured) bits in one FIC block.
    pub fn fic_coded_block_bits(&self) -> usize {
        3 * self.fic_block_bits
    }

    pub fn fibs_per_frame(&self) -> usize {
        self.fic_blocks_per_frame * self.fic_block_bits / 256
    }

    pub fn symbols_per_cif(&self) -> usize {
        CIF_BITS / self.bits_per_symbol()
    }
}
