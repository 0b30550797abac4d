// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Rate 1/4, constraint length 7 convolutional code and its soft-decision
//! Viterbi decoder.

/// Generator polynomials (octal 133, 171, 145, 133). Bit 6 taps the
/// current input, bit 0 the input six steps back.
const POLYS: [u8; 4] = [0o133, 0o171, 0o145, 0o133];
const STATES: usize = 64;
/// Flush bits appended by the encoder.
pub const TAIL_BITS: usize = 6;

fn parity(v: u8) -> u8 {
    (v.count_ones() & 1) as u8
}

/// The four output bits for shift register content `reg` (7 bits).
fn outputs(reg: u8) -> [u8; 4] {
    POLYS.map(|p| parity(reg & p))
}

/// Encode `bits` followed by six zero flush bits: `4 * (len + 6)` output bits.
pub fn encode(bits: &[u8]) -> Vec<u8> {
    let mut state = 0u8;
    let mut out = Vec::with_capacity(4 * (bits.len() + TAIL_BITS));
    for &b in bits.iter().chain([0u8; TAIL_BITS].iter()) {
        let reg = ((b & 1) << 6) | state;
        out.extend_from_slice(&outputs(reg));
        state = reg >> 1;
    }
    out
}

/// Soft-decision decoder. Positive input means 1, zero is an erasure.
pub struct Viterbi {
    branch: [[u8; 4]; 128],
    metrics: [i32; STATES],
    next: [i32; STATES],
    decisions: Vec<u64>,
}

impl Default for Viterbi {
    fn default() -> Self {
        Self::new()
    }
}

impl Viterbi {
    pub fn new() -> Self {
        let mut branch = [[0u8; 4]; 128];
        for (reg, out) in branch.iter_mut().enumerate() {
            *out = outputs(reg as u8);
        }
        Self {
            branch,
            metrics: [0; STATES],
            next: [0; STATES],
            decisions: Vec::new(),
        }
    }

    /// Decode `soft.len() / 4 - 6` information bits into `out`. The path is
    /// traced back from the all-zero state the flush bits force.
    pub fn decode(&mut self, soft: &[i16], out: &mut Vec<u8>) {
        let steps = soft.len() / 4;
        out.clear();
        if steps <= TAIL_BITS {
            return;
        }

        self.metrics = [i32::MIN / 2; STATES];
        self.metrics[0] = 0;
        self.decisions.clear();
        self.decisions.reserve(steps);

        for symbol in soft.chunks_exact(4) {
            let mut decided = 0u64;
            for state in 0..STATES {
                // Predecessors share the upper five bits; they differ in the
                // bit shifted out.
                let mut best = i32::MIN;
                let mut choice = 0u64;
                for lsb in 0..2usize {
                    let prev = ((state & 0x1f) << 1) | lsb;
                    let reg = (state << 1) | lsb;
                    let expected = &self.branch[reg];
                    let mut metric = self.metrics[prev];
                    for (e, &s) in expected.iter().zip(symbol) {
                        metric += if *e == 1 { i32::from(s) } else { -i32::from(s) };
                    }
                    if metric > best {
                        best = metric;
                        choice = lsb as u64;
                    }
                }
                self.next[state] = best;
                decided |= choice << state;
            }
            std::mem::swap(&mut self.metrics, &mut self.next);
            self.decisions.push(decided);
        }

        let mut bits = vec![0u8; steps];
        let mut state = 0usize;
        for (t, decided) in self.decisions.iter().enumerate().rev() {
            bits[t] = (state >> 5) as u8;
            let lsb = ((decided >> state) & 1) as usize;
            state = ((state & 0x1f) << 1) | lsb;
        }
        bits.truncate(steps - TAIL_BITS);
        *out = bits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_soft(bits: &[u8]) -> Vec<i16> {
        bits.iter().map(|&b| if b == 1 { 127 } else { -127 }).collect()
    }

    fn message(len: usize) -> Vec<u8> {
        (0..len).map(|i| ((i * 13 + i / 7) % 3 == 0) as u8).collect()
    }

    #[test]
    fn encoder_output_length_and_tail() {
        let coded = encode(&[1, 0, 1]);
        assert_eq!(coded.len(), 4 * 9);
        // A single 1 from the zero state sets every tap at delay 0.
        assert_eq!(&encode(&[1])[..4], &[1, 1, 1, 1]);
    }

    #[test]
    fn decodes_clean_codeword() {
        let msg = message(768);
        let mut v = Viterbi::new();
        let mut out = Vec::new();
        v.decode(&to_soft(&encode(&msg)), &mut out);
        assert_eq!(out, msg);
    }

    #[test]
    fn corrects_scattered_errors_and_erasures() {
        let msg = message(256);
        let mut soft = to_soft(&encode(&msg));
        for i in (0..soft.len()).step_by(23) {
            soft[i] = -soft[i];
        }
        for i in (5..soft.len()).step_by(4) {
            soft[i] = 0;
        }
        let mut v = Viterbi::new();
        let mut out = Vec::new();
        v.decode(&soft, &mut out);
        assert_eq!(out, msg);
    }

    #[test]
    fn too_short_input_decodes_nothing() {
        let mut v = Viterbi::new();
        let mut out = vec![1];
        v.decode(&[0; 24], &mut out);
        assert!(out.is_empty());
    }
}
