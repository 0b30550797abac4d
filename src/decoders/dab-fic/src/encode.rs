// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Transmit side of the FIC, used to build loopback test signals.

use dab_core::ModeParams;

use crate::bits::unpack_bits;
use crate::crc::{seal_fib, FIB_BYTES, FIB_DATA_BYTES};
use crate::prbs::{disperse, prbs};
use crate::puncture::{fic_mask, puncture};
use crate::viterbi::encode;

/// Assemble FIG records into a sealed FIB. Unused space gets the end
/// marker followed by zero padding. Returns `None` if the records do not fit.
pub fn fib(figs: &[&[u8]]) -> Option<[u8; FIB_BYTES]> {
    let mut fib = [0u8; FIB_BYTES];
    let mut pos = 0;
    for fig in figs {
        if pos + fig.len() > FIB_DATA_BYTES {
            return None;
        }
        fib[pos..pos + fig.len()].copy_from_slice(fig);
        pos += fig.len();
    }
    if pos < FIB_DATA_BYTES {
        fib[pos] = 0xff;
    }
    seal_fib(&mut fib);
    Some(fib)
}

/// FIG 0 record with extension `ext`; `next` sets the C/N flag.
pub fn fig0(ext: u8, next: bool, payload: &[u8]) -> Vec<u8> {
    let mut fig = vec![(payload.len() + 1) as u8];
    fig.push(((next as u8) << 7) | ext);
    fig.extend_from_slice(payload);
    fig
}

/// FIG 0/0 for ensemble `eid`. A non-zero `change_flags` appends the
/// occurrence change byte.
pub fn ensemble_info(eid: u16, change_flags: u8) -> Vec<u8> {
    let mut payload = eid.to_be_bytes().to_vec();
    payload.extend_from_slice(&[change_flags << 6, 0x00]);
    if change_flags != 0 {
        payload.push(0x10);
    }
    fig0(0, false, &payload)
}

/// FIG 0/1 short form: sub-channel `id` at `start`, UEP index 12 (42 CUs).
pub fn sub_channel(id: u8, start: u16, next: bool) -> Vec<u8> {
    let word: u32 = (u32::from(id) << 18) | (u32::from(start) << 8) | 12;
    fig0(1, next, &word.to_be_bytes()[1..])
}

/// FIG 0/2: programme service `sid` with one primary DAB+ component on `subch`.
pub fn audio_service(sid: u16, subch: u8, next: bool) -> Vec<u8> {
    let comp: u16 = (63 << 8) | (u16::from(subch) << 2) | 0b10;
    let mut payload = sid.to_be_bytes().to_vec();
    payload.push(0x01);
    payload.extend_from_slice(&comp.to_be_bytes());
    fig0(2, next, &payload)
}

fn label(ext: u8, id: u16, text: &str) -> Vec<u8> {
    let mut fig = vec![0x20 | 21, ext];
    fig.extend_from_slice(&id.to_be_bytes());
    let mut field = [b' '; 16];
    let n = text.len().min(16);
    field[..n].copy_from_slice(&text.as_bytes()[..n]);
    fig.extend_from_slice(&field);
    fig.extend_from_slice(&[0xff, 0x00]);
    fig
}

/// FIG 1/0 ensemble label, EBU Latin, at most 16 ASCII characters.
pub fn ensemble_label(eid: u16, text: &str) -> Vec<u8> {
    label(0, eid, text)
}

/// FIG 1/1 programme service label.
pub fn service_label(sid: u16, text: &str) -> Vec<u8> {
    label(1, sid, text)
}

/// Coded bits of one FIC block: dispersal, convolutional coding and
/// puncturing of `block_bits / 256` FIBs.
pub fn fic_block(fibs: &[[u8; FIB_BYTES]], block_bits: usize) -> Vec<u8> {
    let mut bits: Vec<u8> = fibs.iter().flat_map(|f| unpack_bits(f)).collect();
    bits.resize(block_bits, 0);
    disperse(&mut bits, &prbs(block_bits));
    puncture(&encode(&bits), &fic_mask(block_bits))
}

/// Hard bits of the FIC symbols of one frame, one `2K` vector per symbol.
/// `fibs` is cycled if it holds fewer FIBs than the frame carries.
pub fn fic_symbols(params: &ModeParams, fibs: &[[u8; FIB_BYTES]]) -> Vec<Vec<u8>> {
    let per_block = params.fic_block_bits / 256;
    let mut frame_fibs: Vec<[u8; FIB_BYTES]> = Vec::with_capacity(params.fibs_per_frame());
    if !fibs.is_empty() {
        frame_fibs.extend(fibs.iter().cycle().take(params.fibs_per_frame()));
    }
    let mut coded = Vec::with_capacity(params.fic_symbols * params.bits_per_symbol());
    for block in 0..params.fic_blocks_per_frame {
        let start = (block * per_block).min(frame_fibs.len());
        let end = (start + per_block).min(frame_fibs.len());
        coded.extend(fic_block(&frame_fibs[start..end], params.fic_block_bits));
    }
    coded
        .chunks(params.bits_per_symbol())
        .map(|c| c.to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::check_fib;
    use dab_core::TransmissionMode;

    #[test]
    fn fib_is_sealed_and_terminated() {
        let f = fib(&[&[0x05, 0x00, 0x10, 0x01, 0x00, 0x00]]).unwrap();
        assert!(check_fib(&f));
        assert_eq!(f[6], 0xff);
        assert!(fib(&[&[0u8; 31]]).is_none());
    }

    #[test]
    fn symbols_fill_the_fic_exactly() {
        for mode in TransmissionMode::ALL {
            let p = mode.params();
            let f = fib(&[]).unwrap();
            let symbols = fic_symbols(&p, &[f]);
            assert_eq!(symbols.len(), p.fic_symbols, "mode {}", mode);
            assert!(symbols.iter().all(|s| s.len() == p.bits_per_symbol()));
        }
    }
}
