//! IEEE counters the port accumulates over its lifetime, exposed
//! to the embedder for diagnostics (CLI `-V`, SIGUSR2 dump, shared-memory
//! IPC).

/// The sixteen per-port counters IEEE 802.1AS names, each saturating rather than
/// wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub rx_sync: u64,
    pub rx_follow_up: u64,
    pub rx_pdelay_request: u64,
    pub rx_pdelay_response: u64,
    pub rx_pdelay_response_follow_up: u64,
    pub rx_announce: u64,
    pub rx_ptp_packet_discard: u64,
    pub rx_sync_receipt_timeouts: u64,
    pub announce_receipt_timeouts: u64,
    pub pdelay_allowed_lost_responses_exceeded: u64,

    pub tx_sync: u64,
    pub tx_follow_up: u64,
    pub tx_pdelay_request: u64,
    pub tx_pdelay_response: u64,
    pub tx_pdelay_response_follow_up: u64,
    pub tx_announce: u64,
}

#[cfg(feature = "std")]
impl core::fmt::Display for Counters {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "rxSync: {}", self.rx_sync)?;
        writeln!(f, "rxFollowUp: {}", self.rx_follow_up)?;
        writeln!(f, "rxPdelayRequest: {}", self.rx_pdelay_request)?;
        writeln!(f, "rxPdelayResponse: {}", self.rx_pdelay_response)?;
        writeln!(
            f,
            "rxPdelayResponseFollowUp: {}",
            self.rx_pdelay_response_follow_up
        )?;
        writeln!(f, "rxAnnounce: {}", self.rx_announce)?;
        writeln!(f, "rxPTPPacketDiscard: {}", self.rx_ptp_packet_discard)?;
        writeln!(
            f,
            "rxSyncReceiptTimeouts: {}",
            self.rx_sync_receipt_timeouts
        )?;
        writeln!(
            f,
            "announceReceiptTimeouts: {}",
            self.announce_receipt_timeouts
        )?;
        writeln!(
            f,
            "pdelayAllowedLostResponsesExceeded: {}",
            self.pdelay_allowed_lost_responses_exceeded
        )?;
        writeln!(f, "txSync: {}", self.tx_sync)?;
        writeln!(f, "txFollowUp: {}", self.tx_follow_up)?;
        writeln!(f, "txPdelayRequest: {}", self.tx_pdelay_request)?;
        writeln!(f, "txPdelayResponse: {}", self.tx_pdelay_response)?;
        writeln!(
            f,
            "txPdelayResponseFollowUp: {}",
            self.tx_pdelay_response_follow_up
        )?;
        write!(f, "txAnnounce: {}", self.tx_announce)
    }
}
