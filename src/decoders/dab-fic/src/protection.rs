// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sub-channel protection profiles and bit rates.

use serde::Serialize;

/// `(size in CUs, protection level, bit rate in kbit/s)` indexed by the
/// short-form table index.
const UEP_TABLE: [(u16, u8, u16); 64] = [
    (16, 5, 32),
    (21, 4, 32),
    (24, 3, 32),
    (29, 2, 32),
    (35, 1, 32),
    (24, 5, 48),
    (29, 4, 48),
    (35, 3, 48),
    (42, 2, 48),
    (52, 1, 48),
    (29, 5, 56),
    (35, 4, 56),
    (42, 3, 56),
    (52, 2, 56),
    (32, 5, 64),
    (42, 4, 64),
    (48, 3, 64),
    (58, 2, 64),
    (70, 1, 64),
    (40, 5, 80),
    (52, 4, 80),
    (58, 3, 80),
    (70, 2, 80),
    (84, 1, 80),
    (48, 5, 96),
    (58, 4, 96),
    (70, 3, 96),
    (84, 2, 96),
    (104, 1, 96),
    (58, 5, 112),
    (70, 4, 112),
    (84, 3, 112),
    (104, 2, 112),
    (64, 5, 128),
    (84, 4, 128),
    (96, 3, 128),
    (116, 2, 128),
    (140, 1, 128),
    (80, 5, 160),
    (104, 4, 160),
    (116, 3, 160),
    (140, 2, 160),
    (168, 1, 160),
    (96, 5, 192),
    (116, 4, 192),
    (140, 3, 192),
    (168, 2, 192),
    (208, 1, 192),
    (116, 5, 224),
    (140, 4, 224),
    (168, 3, 224),
    (208, 2, 224),
    (232, 1, 224),
    (128, 5, 256),
    (168, 4, 256),
    (192, 3, 256),
    (232, 2, 256),
    (280, 1, 256),
    (160, 5, 320),
    (208, 4, 320),
    (280, 2, 320),
    (192, 5, 384),
    (280, 3, 384),
    (416, 1, 384),
];

/// CUs per 8 kbit/s for EEP-A levels 1..=4.
const EEP_A_FACTOR: [u16; 4] = [12, 8, 6, 4];
/// CUs per 32 kbit/s for EEP-B levels 1..=4.
const EEP_B_FACTOR: [u16; 4] = [27, 21, 18, 15];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Protection {
    /// Unequal error protection, short form. `level` is 1..=5.
    Uep { table_index: u8, level: u8 },
    /// Equal error protection profile A, `level` 1..=4.
    EepA { level: u8 },
    /// Equal error protection profile B, `level` 1..=4.
    EepB { level: u8 },
}

impl Protection {
    /// Short-form protection: returns the profile, size in CUs and bit rate.
    pub fn from_short_form(table_index: u8) -> Option<(Self, u16, u16)> {
        let &(size, level, bitrate) = UEP_TABLE.get(table_index as usize)?;
        Some((Self::Uep { table_index, level }, size, bitrate))
    }

    /// Long-form protection: `option` 0 is EEP-A, 1 is EEP-B; `level_code`
    /// is the raw 2-bit field (level - 1). Returns the profile and bit rate.
    pub fn from_long_form(option: u8, level_code: u8, size: u16) -> Option<(Self, u16)> {
        let level = level_code + 1;
        let idx = level_code as usize;
        match option {
            0 => {
                let factor = *EEP_A_FACTOR.get(idx)?;
                if size == 0 || size % factor != 0 {
                    return None;
                }
                Some((Self::EepA { level }, size / factor * 8))
            }
            1 => {
                let factor = *EEP_B_FACTOR.get(idx)?;
                if size == 0 || size % factor != 0 {
                    return None;
                }
                Some((Self::EepB { level }, size / factor * 32))
            }
            _ => None,
        }
    }

    /// Human-readable form such as `UEP 3` or `EEP 2-A`.
    pub fn label(&self) -> String {
        match self {
            Self::Uep { level, .. } => format!("UEP {}", level),
            Self::EepA { level } => format!("EEP {}-A", level),
            Self::EepB { level } => format!("EEP {}-B", level),
        }
    }
}
