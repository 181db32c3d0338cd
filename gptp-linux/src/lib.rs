//! The Linux embedder for `gptp-core`: raw-Ethernet send/receive
//! with hardware timestamp capture, the Linux PTP/system clock, a
//! std-thread timer-dispatch queue, POSIX shared-memory IPC export,
//! persistence-file load/save, and the CLI/INI configuration layers.

pub mod cli;
pub mod clock;
pub mod config;
pub mod ipc;
pub mod link_watch;
pub mod network;
pub mod persistence;
pub mod signals;
pub mod sync;
pub mod timer;

use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

/// Bridge `log` (used by `gptp-core`) onto a `tracing-subscriber`
/// `fmt` layer (used by this binary).
pub fn setup_logger(level: tracing::Level, test_mode: bool) -> Result<(), anyhow::Error> {
    LogTracer::init()?;

    let filter = if test_mode {
        EnvFilter::new("trace")
    } else {
        EnvFilter::new(level.to_string())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(true)
        .init();

    Ok(())
}
