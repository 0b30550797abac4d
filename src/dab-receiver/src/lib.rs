// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! DAB receiver core: synchronisation, FIC decoding and MSC distribution
//! running on two worker threads.

pub mod config;
pub mod controller;
pub mod msc;
pub mod reader;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use dab_core::{DabEventEmitter, ModeParams, SampleSource};
use dab_fic::{EnsembleConfig, EnsembleDecoder, SharedEnsemble};
use tokio::sync::mpsc;

pub use config::ReceiverConfig;
pub use controller::{FrequencyOffset, SyncController, SyncStats};
pub use msc::{CifAssembler, CuSink, MscDemultiplexer, MscMessage, ServiceDescriptor};
pub use reader::{ReaderStopped, SampleReader};

/// A running receiver. Dropping it stops both threads.
pub struct DabReceiver {
    params: ModeParams,
    stop: Arc<AtomicBool>,
    ensemble: SharedEnsemble,
    demux: Arc<MscDemultiplexer>,
    sync_thread: Option<JoinHandle<SyncStats>>,
    msc_thread: Option<JoinHandle<()>>,
}

impl DabReceiver {
    /// Spawn the `dab-sync` and `dab-msc` threads reading from `source`.
    pub fn start(
        config: ReceiverConfig,
        source: Box<dyn SampleSource>,
        emitter: DabEventEmitter,
    ) -> io::Result<Self> {
        let params = config.mode.params();
        let stop = Arc::new(AtomicBool::new(false));
        let ensemble = SharedEnsemble::new();
        let demux = Arc::new(MscDemultiplexer::new());
        let (tx, rx) = mpsc::channel(params.msc_symbols().max(1));

        let msc_thread = {
            let demux = demux.clone();
            let ensemble = ensemble.clone();
            let assembler = CifAssembler::new(&params);
            std::thread::Builder::new()
                .name("dab-msc".to_string())
                .spawn(move || msc::run_msc_loop(rx, demux, assembler, ensemble))?
        };

        let reader = SampleReader::new(source, stop.clone());
        let controller =
            SyncController::new(config, reader, EnsembleDecoder::new(ensemble.clone()), emitter)
                .with_msc(tx);
        let sync_thread = match std::thread::Builder::new()
            .name("dab-sync".to_string())
            .spawn(move || controller.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                // The sender went down with the closure, so the MSC thread ends.
                if msc_thread.join().is_err() {
                    tracing::error!("MSC thread panicked");
                }
                return Err(e);
            }
        };

        tracing::info!("receiver started in mode {}", params.mode);
        Ok(Self {
            params,
            stop,
            ensemble,
            demux,
            sync_thread: Some(sync_thread),
            msc_thread: Some(msc_thread),
        })
    }

    pub fn params(&self) -> &ModeParams {
        &self.params
    }

    pub fn is_running(&self) -> bool {
        self.sync_thread
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Current ensemble configuration.
    pub fn ensemble(&self) -> Arc<EnsembleConfig> {
        self.ensemble.snapshot()
    }

    pub fn shared_ensemble(&self) -> SharedEnsemble {
        self.ensemble.clone()
    }

    pub fn subscribe(&self, desc: ServiceDescriptor, sink: Arc<dyn CuSink>) -> bool {
        self.demux.subscribe(desc, sink)
    }

    /// Subscribe to the primary audio component of the service labelled
    /// `name`. False if the service is unknown or already subscribed.
    pub fn subscribe_audio_service(&self, name: &str, sink: Arc<dyn CuSink>) -> bool {
        match self.ensemble.snapshot().data_for_audio_service(name) {
            Some(audio) => self.demux.subscribe(ServiceDescriptor::from(&audio), sink),
            None => {
                tracing::warn!("no audio service named {:?}", name);
                false
            }
        }
    }

    pub fn unsubscribe(&self, desc: &ServiceDescriptor) -> bool {
        self.demux.unsubscribe(desc.sid, desc.component)
    }

    pub fn reset_all_subscriptions(&self) {
        self.demux.reset_all_subscriptions();
    }

    pub fn subscriptions(&self) -> Vec<ServiceDescriptor> {
        self.demux.active()
    }

    /// Wait for the source to run dry without requesting a stop.
    pub fn wait(mut self) -> Option<SyncStats> {
        self.join()
    }

    /// Request a stop and wait for both threads.
    pub fn stop(mut self) -> Option<SyncStats> {
        self.stop.store(true, Ordering::Relaxed);
        self.join()
    }

    fn join(&mut self) -> Option<SyncStats> {
        let stats = self.sync_thread.take().and_then(|handle| match handle.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                tracing::error!("sync thread panicked");
                None
            }
        });
        if let Some(handle) = self.msc_thread.take() {
            if handle.join().is_err() {
                tracing::error!("MSC thread panicked");
            }
        }
        stats
    }
}

impl Drop for DabReceiver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dab_core::{BufferSource, SilentSource, TransmissionMode};
    use dab_fic::encode::{audio_service, ensemble_info, fib, fic_symbols, service_label, sub_channel};
    use dab_ofdm::synth::FrameSynth;
    use std::sync::atomic::AtomicUsize;

    fn mode_ii() -> ReceiverConfig {
        ReceiverConfig {
            mode: TransmissionMode::II,
            ..Default::default()
        }
    }

    #[test]
    fn stop_ends_a_receiver_on_endless_input() {
        let rx = DabReceiver::start(mode_ii(), Box::new(SilentSource), DabEventEmitter::new())
            .unwrap();
        assert!(rx.ensemble().services.is_empty());
        let stats = rx.stop().unwrap();
        assert_eq!(stats.frames, 0);
    }

    #[test]
    fn subscribed_sub_channel_receives_cifs() {
        let synth = FrameSynth::new(TransmissionMode::II);
        let p = *synth.params();
        let fibs = [
            fib(&[&ensemble_info(0x4fff, 0), &sub_channel(1, 0, false)]).unwrap(),
            fib(&[&audio_service(0xd210, 1, false)]).unwrap(),
            fib(&[&service_label(0xd210, "Radio One")]).unwrap(),
        ];
        let symbols = fic_symbols(&p, &fibs);
        let mut samples = Vec::new();
        for _ in 0..6 {
            samples.extend(synth.frame(&symbols, None));
        }

        let rx = DabReceiver::start(
            mode_ii(),
            Box::new(BufferSource::new(samples)),
            DabEventEmitter::new(),
        )
        .unwrap();

        let cifs = Arc::new(AtomicUsize::new(0));
        let counter = cifs.clone();
        let desc = ServiceDescriptor {
            sid: 0xd210,
            component: 0,
            sub_channel: 1,
            start_addr: 0,
            length: 42,
        };
        let sink = move |bits: &[i16]| {
            assert_eq!(bits.len(), 42 * 64);
            counter.fetch_add(1, Ordering::SeqCst);
        };
        assert!(rx.subscribe(desc, Arc::new(sink)));
        assert!(!rx.subscribe(desc, Arc::new(|_: &[i16]| {})));
        assert_eq!(rx.subscriptions(), vec![desc]);

        let shared = rx.shared_ensemble();
        let stats = rx.wait().unwrap();
        assert!(stats.frames >= 3);
        assert!(cifs.load(Ordering::SeqCst) >= 1);
        assert_eq!(
            shared.snapshot().data_for_audio_service("Radio One").map(|a| a.start_addr),
            Some(0)
        );
    }
}
