//! Stderr logging for the launcher.
//!
//! Workers inherit the launcher's stderr, so launcher events and rank
//! output interleave on one stream. Text is for humans; JSON keeps the
//! interleaved stream machine-separable.

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

/// Wire format of the log stream.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Install the stderr subscriber. Call once, before any worker spawns.
///
/// Thread names stay on: the runtime names each receiver thread after
/// the peer it serves, which locates a log line in the rank topology.
pub fn init(format: LogFormat, level: LevelFilter) {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .with_ansi(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
