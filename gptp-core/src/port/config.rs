//! Per-port configuration, gathered from the `[ptp]`/`[port]`/`[eth]` INI
//! sections and CLI flags, after `gptp-linux` has parsed them.

use crate::{
    bmc::LocalClockDataset,
    clock::ClockProperties,
    datastructures::common::{ClockQuality, PortIdentity},
    time::{Duration, Interval},
};

/// Fixed per-link-speed latency of the physical layer, added to hardware
/// timestamps before they enter the peer-delay and sync computations
/// (CLI flag `-D gbTx,gbRx,mbTx,mbRx`).
///
/// Per DESIGN.md's resolution of the phy-delay open question, this is
/// applied uniformly to Pdelay-Req/Resp timestamps and to a one-step Sync's
/// origin timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhyDelay {
    pub tx: Duration,
    pub rx: Duration,
}

/// Automotive (AVnu) profile override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomotiveConfig {
    /// This clock is the fixed grandmaster (`-GM`); otherwise it is a fixed
    /// slave. BMCA never runs while this profile is active.
    pub is_grandmaster: bool,
    /// Sync interval to switch to after the "initial" period, signalled via
    /// Signalling TLVs rather than inferred from BMCA.
    pub operational_log_sync_interval: Interval,
    pub operational_log_pdelay_interval: Interval,
}

/// Everything the port state machine needs to know about its own
/// configuration, independent of the embedder's transport/clock specifics.
#[derive(Debug, Clone)]
pub struct PortConfig {
    pub port_identity: PortIdentity,
    pub domain_number: u8,

    /// This clock's own comparison-dataset attributes, advertised when it
    /// becomes master (CLI flags `-P`/`-PRIORITY2`).
    pub priority1: u8,
    pub priority2: u8,
    pub clock_quality: ClockQuality,

    pub log_announce_interval: Interval,
    pub log_sync_interval: Interval,
    pub log_pdelay_interval: Interval,

    /// Multiplier applied to `2^logInterval` to arm the sync-receipt and
    /// announce-receipt timeouts ("multiplier = 3 for both" per IEEE 802.1AS).
    pub receipt_timeout_multiplier: u8,

    /// Default 5: consecutive `wrongSeqIDCounter` anomalies before a slave
    /// recommends itself as master absent a qualified Announce.
    pub sync_receipt_threshold: u32,

    /// Default 800ns: the one-way-delay bound `asCapable` requires.
    pub neighbor_prop_delay_threshold: Duration,

    pub peer_delay: crate::port::peer_delay::PeerDelayConfig,

    /// Hold time for the `PRE_MASTER` transitional state; zero by default.
    pub pre_master_duration: Duration,

    pub phy_delay: PhyDelay,

    pub automotive: Option<AutomotiveConfig>,
}

impl PortConfig {
    /// The local clock's own comparison dataset (D0), used by BMCA when no
    /// qualified foreign master beats it.
    pub fn local_clock_dataset(&self) -> LocalClockDataset {
        LocalClockDataset {
            priority1: self.priority1,
            clock_quality: self.clock_quality,
            priority2: self.priority2,
            clock_identity: self.port_identity.clock_identity,
        }
    }

    pub fn clock_properties(&self) -> ClockProperties {
        ClockProperties::default()
    }
}
