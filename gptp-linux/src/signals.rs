//! Signal handling: `SIGHUP` flushes the persistence file,
//! `SIGUSR2` dumps the IEEE counters, `SIGINT`/`SIGTERM` request a clean
//! shutdown.
//!
//! There is no file-scope `pClock`/`pPort`: the signal handler only posts
//! an event onto a channel the main loop already owns.

use std::sync::mpsc::{Receiver, Sender};

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM, SIGUSR2};
use signal_hook::iterator::Signals;

/// An event posted by the signal thread onto the main event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// `SIGHUP`: flush current port/clock state to the persistence file.
    FlushPersistence,
    /// `SIGUSR2`: dump the IEEE counters to the log.
    DumpCounters,
    /// `SIGINT`/`SIGTERM`: begin graceful shutdown.
    Shutdown,
}

/// Spawns the signal-watching thread and returns the receiving end of its
/// channel. The thread runs for the life of the process; there is nothing
/// to join on shutdown since `signal_hook`'s iterator has no clean way to
/// be interrupted and the process is exiting anyway.
pub fn spawn(sender: Sender<SignalEvent>) -> std::io::Result<()> {
    let mut signals = Signals::new([SIGHUP, SIGUSR2, SIGINT, SIGTERM])?;
    std::thread::Builder::new()
        .name("gptp-signals".into())
        .spawn(move || {
            for signal in signals.forever() {
                let event = match signal {
                    SIGHUP => SignalEvent::FlushPersistence,
                    SIGUSR2 => SignalEvent::DumpCounters,
                    SIGINT | SIGTERM => SignalEvent::Shutdown,
                    _ => continue,
                };
                let shutdown = event == SignalEvent::Shutdown;
                if sender.send(event).is_err() {
                    break;
                }
                if shutdown {
                    break;
                }
            }
        })?;
    Ok(())
}

/// Convenience channel pair for callers that just want the receiver.
pub fn channel() -> (Sender<SignalEvent>, Receiver<SignalEvent>) {
    std::sync::mpsc::channel()
}
