// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Main Service Channel demultiplexing.
//!
//! MSC symbols are assembled into CIFs and every subscribed sub-channel's
//! capacity units are handed to its sink. The subscription table is
//! copy-on-write: mutation swaps in a new table under a short lock, and
//! CIF slicing works on a snapshot without holding it.

use std::sync::{Arc, Mutex};

use dab_core::mode::{CIF_BITS, CUS_PER_CIF, CU_BITS};
use dab_core::ModeParams;
use dab_fic::{AudioDescriptor, EnsembleConfig, PacketDescriptor, SharedEnsemble};
use tokio::sync::mpsc;

/// Consumer of one sub-channel's soft bits, one CIF slice per call.
pub trait CuSink: Send + Sync {
    fn put(&self, bits: &[i16]);
}

impl<F: Fn(&[i16]) + Send + Sync> CuSink for F {
    fn put(&self, bits: &[i16]) {
        self(bits)
    }
}

/// Where in the CIF a service component lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub sid: u32,
    pub component: u8,
    pub sub_channel: u8,
    /// First capacity unit.
    pub start_addr: u16,
    /// Capacity units.
    pub length: u16,
}

impl From<&AudioDescriptor> for ServiceDescriptor {
    fn from(d: &AudioDescriptor) -> Self {
        Self {
            sid: d.sid,
            component: d.component,
            sub_channel: d.sub_channel,
            start_addr: d.start_addr,
            length: d.length,
        }
    }
}

impl From<&PacketDescriptor> for ServiceDescriptor {
    fn from(d: &PacketDescriptor) -> Self {
        Self {
            sid: d.sid,
            component: d.component,
            sub_channel: d.sub_channel,
            start_addr: d.start_addr,
            length: d.length,
        }
    }
}

impl ServiceDescriptor {
    fn bit_range(&self) -> Option<std::ops::Range<usize>> {
        let start = usize::from(self.start_addr);
        let end = start + usize::from(self.length);
        if self.length == 0 || end > CUS_PER_CIF {
            return None;
        }
        Some(start * CU_BITS..end * CU_BITS)
    }
}

#[derive(Clone)]
struct Subscription {
    desc: ServiceDescriptor,
    sink: Arc<dyn CuSink>,
}

/// Messages from the synchronisation thread to the MSC thread.
pub enum MscMessage {
    /// Soft bits of MSC symbol `index` (0-based among the frame's MSC symbols).
    Symbol { index: usize, bits: Vec<i16> },
    /// The ensemble configuration generation swapped.
    Reconfigured,
    /// Synchronisation was lost; drop partial CIFs.
    Reset,
}

pub struct MscDemultiplexer {
    subscriptions: Mutex<Arc<[Subscription]>>,
}

impl Default for MscDemultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl MscDemultiplexer {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(Arc::from(Vec::new())),
        }
    }

    fn table(&self) -> Arc<[Subscription]> {
        match self.subscriptions.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut Vec<Subscription>) -> R) -> R {
        let mut guard = match self.subscriptions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut table = guard.to_vec();
        let result = f(&mut table);
        *guard = Arc::from(table);
        result
    }

    /// Start delivering `desc`'s capacity units to `sink`. Returns false if
    /// the component is already subscribed or the descriptor is unusable.
    pub fn subscribe(&self, desc: ServiceDescriptor, sink: Arc<dyn CuSink>) -> bool {
        if desc.bit_range().is_none() {
            tracing::warn!(
                "refusing subscription {:X}/{}: CUs {}+{} out of range",
                desc.sid,
                desc.component,
                desc.start_addr,
                desc.length
            );
            return false;
        }
        let added = self.update(|table| {
            if table
                .iter()
                .any(|s| s.desc.sid == desc.sid && s.desc.component == desc.component)
            {
                return false;
            }
            table.push(Subscription { desc, sink });
            true
        });
        if added {
            tracing::info!(
                "subscribed {:X}/{} (sub-channel {}, CU {}+{})",
                desc.sid,
                desc.component,
                desc.sub_channel,
                desc.start_addr,
                desc.length
            );
        }
        added
    }

    pub fn unsubscribe(&self, sid: u32, component: u8) -> bool {
        let removed = self.update(|table| {
            let before = table.len();
            table.retain(|s| !(s.desc.sid == sid && s.desc.component == component));
            before != table.len()
        });
        if removed {
            tracing::info!("unsubscribed {:X}/{}", sid, component);
        }
        removed
    }

    pub fn reset_all_subscriptions(&self) {
        let count = self.update(|table| std::mem::take(table).len());
        tracing::debug!("dropped {} subscriptions", count);
    }

    pub fn active(&self) -> Vec<ServiceDescriptor> {
        self.table().iter().map(|s| s.desc).collect()
    }

    /// Re-resolve every subscription against `config`: moved sub-channels
    /// are followed, vanished components are dropped. Returns the number of
    /// subscriptions that changed or were dropped.
    pub fn revalidate(&self, config: &EnsembleConfig) -> usize {
        self.update(|table| {
            let mut changed = 0;
            table.retain_mut(|s| {
                let resolved = config
                    .component(s.desc.sid, s.desc.component)
                    .and_then(|c| config.component_sub_channel(c));
                match resolved {
                    Some(sc) => {
                        if sc.id != s.desc.sub_channel
                            || sc.start_addr != s.desc.start_addr
                            || sc.size != s.desc.length
                        {
                            tracing::info!(
                                "{:X}/{} moved to sub-channel {} (CU {}+{})",
                                s.desc.sid,
                                s.desc.component,
                                sc.id,
                                sc.start_addr,
                                sc.size
                            );
                            s.desc.sub_channel = sc.id;
                            s.desc.start_addr = sc.start_addr;
                            s.desc.length = sc.size;
                            changed += 1;
                        }
                        true
                    }
                    None => {
                        tracing::warn!(
                            "{:X}/{} vanished from the ensemble, subscription dropped",
                            s.desc.sid,
                            s.desc.component
                        );
                        changed += 1;
                        false
                    }
                }
            });
            changed
        })
    }

    /// Hand each subscriber its slice of a complete CIF.
    pub fn dispatch_cif(&self, cif: &[i16]) {
        for sub in self.table().iter() {
            if let Some(slice) = sub.desc.bit_range().and_then(|r| cif.get(r)) {
                sub.sink.put(slice);
            }
        }
    }
}

/// Collects MSC symbols into CIFs.
pub struct CifAssembler {
    bits_per_symbol: usize,
    symbols_per_cif: usize,
    cif: Vec<i16>,
    expected: usize,
}

impl CifAssembler {
    pub fn new(params: &ModeParams) -> Self {
        Self {
            bits_per_symbol: params.bits_per_symbol(),
            symbols_per_cif: params.symbols_per_cif(),
            cif: vec![0; CIF_BITS],
            expected: 0,
        }
    }

    pub fn reset(&mut self) {
        self.expected = 0;
    }

    /// Add MSC symbol `index`; returns the CIF once its last symbol is in.
    /// A gap in the sequence discards the CIF being assembled.
    pub fn push(&mut self, index: usize, bits: &[i16]) -> Option<&[i16]> {
        let slot = index % self.symbols_per_cif;
        if slot != self.expected {
            if slot != 0 {
                self.expected = 0;
                return None;
            }
            tracing::trace!("CIF restarted at MSC symbol {}", index);
        }
        let at = slot * self.bits_per_symbol;
        let n = self.bits_per_symbol.min(bits.len());
        self.cif[at..at + n].copy_from_slice(&bits[..n]);

        if slot + 1 == self.symbols_per_cif {
            self.expected = 0;
            Some(&self.cif)
        } else {
            self.expected = slot + 1;
            None
        }
    }
}

/// Body of the MSC thread: runs until the sending side goes away.
pub fn run_msc_loop(
    mut rx: mpsc::Receiver<MscMessage>,
    demux: Arc<MscDemultiplexer>,
    mut assembler: CifAssembler,
    ensemble: SharedEnsemble,
) {
    let mut cifs = 0u64;
    while let Some(msg) = rx.blocking_recv() {
        match msg {
            MscMessage::Symbol { index, bits } => {
                if let Some(cif) = assembler.push(index, &bits) {
                    demux.dispatch_cif(cif);
                    cifs += 1;
                }
            }
            MscMessage::Reconfigured => {
                let changed = demux.revalidate(&ensemble.snapshot());
                tracing::debug!("subscriptions revalidated, {} changed", changed);
            }
            MscMessage::Reset => assembler.reset(),
        }
    }
    tracing::debug!("MSC loop finished after {} CIFs", cifs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dab_core::TransmissionMode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn desc(sid: u32, start: u16, length: u16) -> ServiceDescriptor {
        ServiceDescriptor {
            sid,
            component: 0,
            sub_channel: 1,
            start_addr: start,
            length,
        }
    }

    fn counting_sink() -> (Arc<AtomicUsize>, Arc<dyn CuSink>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sink = move |bits: &[i16]| {
            c.fetch_add(bits.len(), Ordering::Relaxed);
        };
        (count, Arc::new(sink))
    }

    #[test]
    fn duplicate_subscription_is_a_no_op() {
        let demux = MscDemultiplexer::new();
        let (_, sink) = counting_sink();
        assert!(demux.subscribe(desc(0xd210, 0, 42), sink.clone()));
        assert!(!demux.subscribe(desc(0xd210, 0, 42), sink.clone()));
        assert_eq!(demux.active().len(), 1);

        assert!(!demux.subscribe(desc(0xd220, 850, 42), sink.clone()));
        assert!(demux.unsubscribe(0xd210, 0));
        assert!(!demux.unsubscribe(0xd210, 0));
        assert!(demux.subscribe(desc(0xd210, 0, 42), sink));
        demux.reset_all_subscriptions();
        assert!(demux.active().is_empty());
    }

    #[test]
    fn cif_slices_reach_their_sinks() {
        let demux = MscDemultiplexer::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        demux.subscribe(
            desc(0xd210, 2, 3),
            Arc::new(move |bits: &[i16]| {
                if let Ok(mut v) = s.lock() {
                    v.push(bits.to_vec());
                }
            }),
        );
        let cif: Vec<i16> = (0..CIF_BITS).map(|i| (i / CU_BITS) as i16).collect();
        demux.dispatch_cif(&cif);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].len(), 3 * CU_BITS);
        assert_eq!(seen[0][0], 2);
        assert_eq!(seen[0][3 * CU_BITS - 1], 4);
    }

    #[test]
    fn assembler_emits_one_cif_per_symbol_group() {
        let p = TransmissionMode::IV.params();
        let mut asm = CifAssembler::new(&p);
        let bits = vec![1i16; p.bits_per_symbol()];
        let mut cifs = 0;
        for index in 0..p.msc_symbols() {
            if asm.push(index, &bits).is_some() {
                cifs += 1;
            }
        }
        assert_eq!(cifs, p.cifs_per_frame);
    }

    #[test]
    fn assembler_drops_cif_with_gap() {
        let p = TransmissionMode::II.params();
        let mut asm = CifAssembler::new(&p);
        let bits = vec![1i16; p.bits_per_symbol()];
        let mut cifs = 0;
        for index in (0..p.msc_symbols()).filter(|&i| i != 10) {
            if asm.push(index, &bits).is_some() {
                cifs += 1;
            }
        }
        assert_eq!(cifs, 0);
        for index in 0..p.msc_symbols() {
            if asm.push(index, &bits).is_some() {
                cifs += 1;
            }
        }
        assert_eq!(cifs, 1);
    }

    #[test]
    fn msc_loop_dispatches_until_sender_drops() {
        let p = TransmissionMode::II.params();
        let demux = Arc::new(MscDemultiplexer::new());
        let (count, sink) = counting_sink();
        demux.subscribe(desc(0xd210, 0, 10), sink);

        let (tx, rx) = mpsc::channel(p.msc_symbols());
        let d = demux.clone();
        let handle = std::thread::spawn(move || {
            run_msc_loop(rx, d, CifAssembler::new(&p), SharedEnsemble::new())
        });
        for index in 0..p.msc_symbols() {
            tx.blocking_send(MscMessage::Symbol {
                index,
                bits: vec![0; p.bits_per_symbol()],
            })
            .unwrap();
        }
        drop(tx);
        handle.join().unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 10 * CU_BITS);
    }

    #[test]
    fn revalidation_follows_and_drops() {
        let demux = MscDemultiplexer::new();
        let (_, sink) = counting_sink();
        demux.subscribe(desc(0xd210, 0, 42), sink);
        // An empty configuration no longer knows the component.
        assert_eq!(demux.revalidate(&EnsembleConfig::default()), 1);
        assert!(demux.active().is_empty());
    }
}
