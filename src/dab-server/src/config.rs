// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for dab-server.
//!
//! Config is loaded from the `[dab-server]` section of `dab-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./dab-rs.toml`
//! 3. `~/.config/dab-rs/dab-rs.toml`
//! 4. `/etc/dab-rs/dab-rs.toml`

use std::path::PathBuf;

use clap::ValueEnum;
use dab_app::ConfigFile;
use dab_core::TransmissionMode;
use dab_receiver::ReceiverConfig;
use serde::{Deserialize, Serialize};

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub general: GeneralConfig,
    /// Where baseband samples come from
    pub source: SourceConfig,
    /// Synchronisation tuning
    pub receiver: ReceiverConfig,
    /// What to do with the decoded ensemble
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    File,
    Soapysdr,
}

/// Sample layout of an IQ capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Unsigned 8-bit pairs, as written by rtl_sdr
    #[default]
    Cu8,
    /// Signed 16-bit little-endian pairs
    Cs16,
    /// 32-bit float little-endian pairs
    Cf32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// IQ capture path (file source)
    pub path: Option<PathBuf>,
    pub format: SampleFormat,
    /// Start over at the end of the capture
    pub repeat: bool,
    /// SoapySDR device arguments (e.g. "driver=rtlsdr")
    pub args: String,
    /// Centre frequency in Hz (SoapySDR source)
    pub frequency_hz: u64,
    /// RX gain in dB (SoapySDR source)
    pub gain_db: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::File,
            path: None,
            format: SampleFormat::Cu8,
            repeat: false,
            args: String::new(),
            // Block 12C
            frequency_hz: 227_360_000,
            gain_db: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print the ensemble as JSON on exit
    pub json: bool,
    /// Service label to subscribe to once the ensemble is known
    pub program: Option<String>,
    /// Write the subscribed sub-channel's soft bits (i16 LE) here
    pub dump_path: Option<PathBuf>,
    /// Seconds between status lines; 0 disables them
    pub status_interval_secs: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json: false,
            program: None,
            dump_path: None,
            status_interval_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        match self.source.kind {
            SourceKind::File => {
                if self.source.path.is_none() {
                    return Err("[source].path must be set for the file source".to_string());
                }
            }
            SourceKind::Soapysdr => {
                if self.source.frequency_hz == 0 {
                    return Err("[source].frequency_hz must be > 0".to_string());
                }
            }
        }

        self.receiver.validate()?;

        if self.output.dump_path.is_some() && self.output.program.is_none() {
            return Err("[output].dump_path needs [output].program".to_string());
        }
        Ok(())
    }

    /// Generate an example configuration wrapped under the `[dab-server]`
    /// section header, suitable for use in a combined `dab-rs.toml` file.
    pub fn example_combined_toml() -> String {
        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            source: SourceConfig {
                path: Some(PathBuf::from("capture-12c.iq")),
                ..Default::default()
            },
            receiver: ReceiverConfig {
                mode: TransmissionMode::I,
                ..Default::default()
            },
            output: OutputConfig {
                program: Some("Radio One".to_string()),
                ..Default::default()
            },
        };
        example.to_section_toml().unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "dab-server"
    }

    fn validate(&self) -> Result<(), String> {
        ServerConfig::validate(self)
    }
}
