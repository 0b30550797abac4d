// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Effective level: each `-v` raises the configured level one step
/// (INFO when unset or invalid), saturating at TRACE.
pub fn resolve_level(log_level: Option<&str>, verbosity: u8) -> Level {
    let base = log_level
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    const LADDER: [Level; 5] = [
        Level::ERROR,
        Level::WARN,
        Level::INFO,
        Level::DEBUG,
        Level::TRACE,
    ];
    let idx = LADDER.iter().position(|l| *l == base).unwrap_or(2);
    LADDER[(idx + usize::from(verbosity)).min(LADDER.len() - 1)]
}

/// Install the global fmt subscriber. Only the binary calls this.
pub fn init_logging(log_level: Option<&str>, verbosity: u8) {
    let level = resolve_level(log_level, verbosity);

    FmtSubscriber::builder()
        .with_target(false)
        .with_thread_names(true)
        .with_max_level(level)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_resolution() {
        assert_eq!(resolve_level(None, 0), Level::INFO);
        assert_eq!(resolve_level(Some("bogus"), 0), Level::INFO);
        assert_eq!(resolve_level(Some("warn"), 0), Level::WARN);
        assert_eq!(resolve_level(Some("warn"), 1), Level::INFO);
        assert_eq!(resolve_level(None, 2), Level::TRACE);
        assert_eq!(resolve_level(Some("debug"), 9), Level::TRACE);
    }
}
