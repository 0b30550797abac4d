// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod listener;
#[cfg(feature = "soapysdr")]
mod soapy;
mod source;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use dab_app::{init_logging, ConfigFile};
use dab_core::{DabEventEmitter, DynResult, TransmissionMode};
use dab_receiver::{DabReceiver, ServiceDescriptor};

use config::{SampleFormat, ServerConfig, SourceKind};
use listener::{DumpSink, LogListener};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - DAB ensemble receiver");
/// How often the main loop checks on the receiver.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// IQ capture to play back (overrides [source])
    #[arg(value_name = "IQ_FILE")]
    input: Option<PathBuf>,
    /// Sample format of the capture
    #[arg(short = 'f', long = "format", value_enum)]
    format: Option<SampleFormat>,
    /// Start over at the end of the capture
    #[arg(long = "repeat")]
    repeat: bool,
    /// DAB transmission mode (1-4)
    #[arg(short = 'm', long = "mode", value_parser = clap::value_parser!(u8).range(1..=4))]
    mode: Option<u8>,
    /// Service to subscribe to
    #[arg(short = 'p', long = "program")]
    program: Option<String>,
    /// Print the ensemble as JSON on exit
    #[arg(long = "json")]
    json: bool,
    /// Raise log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Command line arguments win over the config file.
fn apply_cli(cli: &Cli, cfg: &mut ServerConfig) -> DynResult<()> {
    if let Some(ref input) = cli.input {
        cfg.source.kind = SourceKind::File;
        cfg.source.path = Some(input.clone());
    }
    if let Some(format) = cli.format {
        cfg.source.format = format;
    }
    if cli.repeat {
        cfg.source.repeat = true;
    }
    if let Some(mode) = cli.mode {
        cfg.receiver.mode = TransmissionMode::try_from(mode)?;
    }
    if let Some(ref program) = cli.program {
        cfg.output.program = Some(program.clone());
    }
    if cli.json {
        cfg.output.json = true;
    }
    Ok(())
}

/// Program subscription, made once the service shows up in the ensemble
/// and made again if a reconfiguration drops it.
struct Program {
    name: String,
    dump: Option<Arc<DumpSink>>,
    /// Service id of the live subscription.
    subscribed: Option<u32>,
}

impl Program {
    fn from_config(cfg: &ServerConfig) -> DynResult<Option<Self>> {
        let Some(name) = cfg.output.program.clone() else {
            return Ok(None);
        };
        let dump = match cfg.output.dump_path {
            Some(ref path) => Some(Arc::new(DumpSink::create(path).map_err(|e| {
                format!("Failed to create {}: {}", path.display(), e)
            })?)),
            None => None,
        };
        Ok(Some(Self {
            name,
            dump,
            subscribed: None,
        }))
    }

    /// Forget the subscription if the demultiplexer no longer holds it.
    /// Returns whether it is still active.
    fn check_active(&mut self, active: &[ServiceDescriptor]) -> bool {
        let Some(sid) = self.subscribed else {
            return false;
        };
        if active.iter().any(|d| d.sid == sid) {
            return true;
        }
        warn!("subscription to {:?} was dropped, waiting for the service", self.name);
        self.subscribed = None;
        false
    }

    fn try_subscribe(&mut self, receiver: &DabReceiver) {
        if self.check_active(&receiver.subscriptions()) {
            return;
        }
        let snapshot = receiver.ensemble();
        let Some(audio) = snapshot.data_for_audio_service(&self.name) else {
            return;
        };
        let sink: Arc<dyn dab_receiver::CuSink> = match self.dump {
            Some(ref dump) => dump.clone(),
            None => Arc::new(|_: &[i16]| {}),
        };
        if receiver.subscribe_audio_service(&self.name, sink) {
            info!(
                "subscribed to {:?} ({:X}, sub-channel {}, {} kbit/s, {})",
                self.name,
                audio.sid,
                audio.sub_channel,
                audio.bitrate,
                if audio.dab_plus { "DAB+" } else { "DAB" }
            );
            self.subscribed = Some(audio.sid);
        }
    }
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_combined_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = ServerConfig::load(cli.config.as_deref())?;
    apply_cli(&cli, &mut cfg)?;
    cfg.validate()
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref(), cli.verbose);

    info!(
        "Starting dab-server {} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("DAB_SERVER_BUILD_DATE")
    );
    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let source = source::open(&cfg.source)?;
    let log_listener = Arc::new(LogListener::new());
    let mut emitter = DabEventEmitter::new();
    emitter.register(log_listener.clone());

    let mut program = Program::from_config(&cfg)?;
    let receiver = DabReceiver::start(cfg.receiver.clone(), source, emitter)?;
    let ensemble = receiver.shared_ensemble();

    let status_every = Duration::from_secs(cfg.output.status_interval_secs);
    let mut last_status = tokio::time::Instant::now();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Interrupted, stopping");
                break;
            }
            _ = ticker.tick() => {
                if !receiver.is_running() {
                    info!("Sample source finished");
                    break;
                }
                if let Some(ref mut program) = program {
                    program.try_subscribe(&receiver);
                }
                if !status_every.is_zero() && last_status.elapsed() >= status_every {
                    last_status = tokio::time::Instant::now();
                    let snapshot = ensemble.snapshot();
                    let (ok, bad) = log_listener.fib_totals();
                    info!(
                        "status: {}, ensemble {:?}, {} services, FIBs {}/{}",
                        if log_listener.is_synced() { "synced" } else { "searching" },
                        snapshot.ensemble_name().unwrap_or("-"),
                        snapshot.services.len(),
                        ok,
                        ok + bad
                    );
                }
            }
        }
    }

    let stats = tokio::task::spawn_blocking(move || receiver.stop()).await?;
    if let Some(stats) = stats {
        info!(
            "{} frames, {} sync losses, {} signal-not-found reports",
            stats.frames, stats.sync_losses, stats.signal_not_found
        );
    }
    if let Some(dump) = program.as_ref().and_then(|p| p.dump.as_ref()) {
        dump.flush();
        info!("{} CIF slices written", dump.written());
    }

    if cfg.output.json {
        let summary = ensemble.snapshot().summary();
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}
