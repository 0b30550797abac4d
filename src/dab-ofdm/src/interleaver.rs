// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Frequency (de)interleaving table.

use dab_core::ModeParams;

/// FFT bin holding signed carrier `k` (negative carriers wrap to the top).
#[inline]
pub fn carrier_bin(k: i32, t_u: usize) -> usize {
    if k < 0 {
        (t_u as i32 + k) as usize
    } else {
        k as usize
    }
}

/// Maps logical carrier positions `0..K` to signed carrier indices in
/// `[-K/2, K/2] \ {0}`.
#[derive(Debug, Clone)]
pub struct FrequencyInterleaver {
    map: Vec<i16>,
}

impl FrequencyInterleaver {
    pub fn new(params: &ModeParams) -> Self {
        let t_u = params.t_u as i32;
        let half = params.carriers as i32 / 2;
        let lower = t_u / 2 - half;
        let upper = t_u / 2 + half;

        let mut map = Vec::with_capacity(params.carriers);
        let mut pi = 0i32;
        for _ in 1..t_u {
            pi = (13 * pi + t_u / 4 - 1) % t_u;
            if pi < lower || pi > upper || pi == t_u / 2 {
                continue;
            }
            map.push((pi - t_u / 2) as i16);
        }
        debug_assert_eq!(map.len(), params.carriers);
        Self { map }
    }

    /// Signed carrier index of logical position `n`.
    #[inline]
    pub fn carrier(&self, n: usize) -> i16 {
        self.map[n]
    }

    pub fn map(&self) -> &[i16] {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dab_core::TransmissionMode;
    use std::collections::HashSet;

    #[test]
    fn every_mode_is_a_bijection_onto_active_carriers() {
        for mode in TransmissionMode::ALL {
            let p = mode.params();
            let il = FrequencyInterleaver::new(&p);
            assert_eq!(il.len(), p.carriers, "mode {}", mode);

            let half = p.carriers as i16 / 2;
            let seen: HashSet<i16> = il.map().iter().copied().collect();
            assert_eq!(seen.len(), p.carriers, "duplicate carrier in mode {}", mode);
            assert!(!seen.contains(&0));
            assert!(seen.iter().all(|k| (-half..=half).contains(k)));
        }
    }

    #[test]
    fn mode_one_sequence_starts_as_published() {
        let il = FrequencyInterleaver::new(&TransmissionMode::I.params());
        // Pi(1) = 511, Pi(2) = 1010, Pi(3) = 1353.
        assert_eq!(&il.map()[..3], &[-513, -14, 329]);
    }

    #[test]
    fn construction_is_deterministic() {
        let p = TransmissionMode::IV.params();
        assert_eq!(
            FrequencyInterleaver::new(&p).map(),
            FrequencyInterleaver::new(&p).map()
        );
    }

    #[test]
    fn negative_carriers_wrap_to_upper_bins() {
        assert_eq!(carrier_bin(1, 512), 1);
        assert_eq!(carrier_bin(-1, 512), 511);
        assert_eq!(carrier_bin(-192, 512), 320);
    }
}
