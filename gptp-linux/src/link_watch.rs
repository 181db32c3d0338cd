//! Link-state watcher thread: observes interface up/down and
//! posts `LINKUP`/`LINKDOWN` onto the main event queue.
//!
//! The workspace's `nix` dependency isn't built with netlink-route support,
//! so rather than add a dependency the rest of the stack has no other use
//! for, this polls the same fact netlink would report — `/sys/class/net/
//! <ifname>/carrier` — which the kernel updates synchronously with the
//! device's own link-up/link-down notifications. Spec §5 permits "netlink
//! or equivalent"; a short sysfs poll is the equivalent used here.

use std::{
    sync::mpsc::Sender,
    time::Duration as StdDuration,
};

/// An event posted by the link-watch thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Up,
    Down,
}

/// How often to re-read the carrier file. The kernel updates it
/// synchronously with the link state change, so this bounds only the
/// latency of noticing, not correctness.
const POLL_INTERVAL: StdDuration = StdDuration::from_millis(200);

fn carrier_path(ifname: &str) -> std::path::PathBuf {
    std::path::PathBuf::from(format!("/sys/class/net/{ifname}/carrier"))
}

/// Reads the current carrier state. A missing or unreadable file (interface
/// removed, or no permission) is treated as link-down rather than
/// propagating an error: the watcher's only job is to report transitions,
/// and a vanished interface is the most down a link can be.
fn read_carrier(ifname: &str) -> bool {
    std::fs::read_to_string(carrier_path(ifname))
        .ok()
        .map(|s| s.trim() == "1")
        .unwrap_or(false)
}

/// Spawns the link-watch thread for `ifname`, posting [`LinkEvent`]s onto
/// `sender` whenever the carrier state changes. The initial state is
/// posted immediately so the caller doesn't have to separately query it
/// before the first transition.
pub fn spawn(ifname: String, sender: Sender<LinkEvent>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("gptp-link-watch".into())
        .spawn(move || {
            let mut up = read_carrier(&ifname);
            let initial = if up { LinkEvent::Up } else { LinkEvent::Down };
            if sender.send(initial).is_err() {
                return;
            }

            loop {
                std::thread::sleep(POLL_INTERVAL);
                let now_up = read_carrier(&ifname);
                if now_up != up {
                    up = now_up;
                    let event = if up { LinkEvent::Up } else { LinkEvent::Down };
                    if sender.send(event).is_err() {
                        return;
                    }
                }
            }
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_interface_reads_as_down() {
        assert!(!read_carrier("gptp-test-no-such-interface"));
    }
}
