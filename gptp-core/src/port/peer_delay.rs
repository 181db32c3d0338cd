//! Peer-delay measurement. Runs continuously while the link is
//! up, independent of the port's master/slave role.

use crate::{
    datastructures::common::{PortIdentity, WireTimestamp},
    time::{Duration, Time},
};

#[derive(Debug, Clone, Copy)]
pub struct PeerDelayConfig {
    pub log_pdelay_interval: i8,
    pub lost_pdelay_resp_thresh: u32,
    pub seq_id_as_capable_thresh: u32,
    pub allow_negative_correction: bool,
}

impl Default for PeerDelayConfig {
    fn default() -> Self {
        PeerDelayConfig {
            log_pdelay_interval: 0,
            lost_pdelay_resp_thresh: 3,
            seq_id_as_capable_thresh: 2,
            allow_negative_correction: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlightExchange {
    sequence_id: u16,
    t1: Option<Time>,
    t2: Option<Time>,
    t3: Option<Time>,
    t4: Option<Time>,
}

/// Per-port state of the peer-delay loop: in-flight exchange, accumulated
/// mean link delay, neighbor rate ratio, and the asCapable promotion/backoff
/// counters.
#[derive(Debug)]
pub(crate) struct PeerDelayState {
    as_capable: bool,
    consecutive_successes: u32,
    consecutive_losses: u32,
    mean_link_delay: Option<Duration>,
    neighbor_rate_ratio: f64,
    in_flight: Option<InFlightExchange>,
    last_reference: Option<(Time, Time)>, // (t4, t3) of the last completed exchange
    /// Identity of the peer the last completed (or in-progress) exchange was
    /// with. `None` means no contact yet this link-up/restore, which is
    /// deliberately not treated as "a change" — see `note_peer`.
    last_peer_identity: Option<PortIdentity>,
}

impl Default for PeerDelayState {
    fn default() -> Self {
        PeerDelayState {
            as_capable: false,
            consecutive_successes: 0,
            consecutive_losses: 0,
            mean_link_delay: None,
            neighbor_rate_ratio: 1.0,
            in_flight: None,
            last_reference: None,
            last_peer_identity: None,
        }
    }
}

pub(crate) enum PdelayOutcome {
    /// Nothing observable yet; keep waiting for more of the exchange.
    Pending,
    /// The exchange completed and `D` was computed. The caller should
    /// follow up with [`PeerDelayState::promote_if_ready`] to check whether
    /// this tips `asCapable`.
    Measured { mean_delay: Duration },
}

impl PeerDelayState {
    pub(crate) fn as_capable(&self) -> bool {
        self.as_capable
    }

    pub(crate) fn mean_delay(&self) -> Option<Duration> {
        self.mean_link_delay
    }

    pub(crate) fn neighbor_rate_ratio(&self) -> f64 {
        self.neighbor_rate_ratio
    }

    /// Seed `asCapable` and the mean-link-delay/neighbor-rate-ratio
    /// estimate from a previous run's [`super::PersistentState`], so a
    /// restart doesn't have to re-earn `asCapable` from an empty exchange
    /// history.
    pub(crate) fn restore(&mut self, as_capable: bool, one_way_delay: Duration, neighbor_rate_ratio: f64) {
        self.as_capable = as_capable;
        self.mean_link_delay = Some(one_way_delay);
        self.neighbor_rate_ratio = neighbor_rate_ratio;
    }

    /// Link went down: no Pdelay is transmitted until LINKUP, and the link
    /// no longer qualifies for time sync.
    pub(crate) fn link_down(&mut self) {
        self.as_capable = false;
        self.consecutive_successes = 0;
        self.in_flight = None;
        self.last_reference = None;
        self.last_peer_identity = None;
    }

    /// Records which peer a Pdelay-Resp/-Resp-Follow-Up came from, resetting
    /// `asCapable` and the success/loss counters if it differs from the peer
    /// of the last exchange. First contact (no prior identity on record,
    /// e.g. right after construction or a persistence-based restore) is not
    /// a change: this preserves a restored `asCapable` across a restart with
    /// the same peer, rather than demoting it on its first post-restore
    /// packet.
    pub(crate) fn note_peer(&mut self, peer: PortIdentity) {
        if let Some(previous) = self.last_peer_identity {
            if previous != peer {
                log::info!("peer clock identity changed from {previous:?} to {peer:?}, resetting asCapable");
                self.as_capable = false;
                self.consecutive_successes = 0;
                self.consecutive_losses = 0;
                self.in_flight = None;
                self.last_reference = None;
            }
        }
        self.last_peer_identity = Some(peer);
    }

    /// The measured one-way delay exceeded `neighborPropDelayThreshold`:
    /// spec mandates this resets `asCapable` to false.
    pub(crate) fn exceed_threshold(&mut self) {
        self.as_capable = false;
        self.consecutive_successes = 0;
    }

    /// A Pdelay-Req is about to be transmitted with this sequence id.
    pub(crate) fn request_sent(&mut self, sequence_id: u16) {
        self.in_flight = Some(InFlightExchange {
            sequence_id,
            t1: None,
            t2: None,
            t3: None,
            t4: None,
        });
    }

    /// The hardware-captured TX timestamp for the request just sent (`t1`).
    pub(crate) fn request_timestamped(&mut self, sequence_id: u16, t1: Time) {
        if let Some(exchange) = self.in_flight.as_mut() {
            if exchange.sequence_id == sequence_id {
                exchange.t1 = Some(t1);
            }
        }
    }

    /// A Pdelay-Resp arrived (`t2` from its body, `t4` from local RX
    /// timestamping).
    pub(crate) fn response_received(
        &mut self,
        sequence_id: u16,
        requesting_port_identity: PortIdentity,
        own_port_identity: PortIdentity,
        request_receipt_timestamp: WireTimestamp,
        t4: Time,
    ) -> PdelayOutcome {
        if requesting_port_identity != own_port_identity {
            return PdelayOutcome::Pending;
        }
        let Some(exchange) = self.in_flight.as_mut() else {
            return PdelayOutcome::Pending;
        };
        if exchange.sequence_id != sequence_id {
            return PdelayOutcome::Pending;
        }
        exchange.t2 = Some(request_receipt_timestamp.to_time());
        exchange.t4 = Some(t4);
        self.try_complete()
    }

    /// A Pdelay-Resp-Follow-Up arrived (`t3`, the peer's TX timestamp of
    /// its Pdelay-Resp).
    pub(crate) fn response_follow_up_received(
        &mut self,
        sequence_id: u16,
        requesting_port_identity: PortIdentity,
        own_port_identity: PortIdentity,
        response_origin_timestamp: WireTimestamp,
    ) -> PdelayOutcome {
        if requesting_port_identity != own_port_identity {
            return PdelayOutcome::Pending;
        }
        let Some(exchange) = self.in_flight.as_mut() else {
            return PdelayOutcome::Pending;
        };
        if exchange.sequence_id != sequence_id {
            return PdelayOutcome::Pending;
        }
        exchange.t3 = Some(response_origin_timestamp.to_time());
        self.try_complete()
    }

    fn try_complete(&mut self) -> PdelayOutcome {
        let Some(exchange) = self.in_flight else {
            return PdelayOutcome::Pending;
        };
        let (Some(t1), Some(t2), Some(t3), Some(t4)) =
            (exchange.t1, exchange.t2, exchange.t3, exchange.t4)
        else {
            return PdelayOutcome::Pending;
        };

        if let Some((prev_t4, prev_t3)) = self.last_reference {
            let local_interval = t4 - prev_t4;
            let peer_interval = t3 - prev_t3;
            if peer_interval.nanos() != 0 {
                self.neighbor_rate_ratio =
                    local_interval.nanos() as f64 / peer_interval.nanos() as f64;
            }
        }
        self.last_reference = Some((t4, t3));

        let mean_delay = ((t4 - t1) - (t3 - t2) * self.neighbor_rate_ratio) / 2;

        self.in_flight = None;
        self.consecutive_losses = 0;
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.mean_link_delay = Some(mean_delay);

        PdelayOutcome::Measured { mean_delay }
    }

    /// Evaluate asCapable promotion against the configured threshold. The
    /// caller invokes this after [`PeerDelayState::response_follow_up_received`]
    /// or [`PeerDelayState::response_received`] returns `Measured`.
    pub(crate) fn promote_if_ready(&mut self, config: &PeerDelayConfig) -> bool {
        if !self.as_capable && self.consecutive_successes >= config.seq_id_as_capable_thresh {
            self.as_capable = true;
            true
        } else {
            false
        }
    }

    /// The receipt timeout for the in-flight exchange fired without it
    /// completing.
    pub(crate) fn receipt_timeout(&mut self, config: &PeerDelayConfig) -> bool {
        if self.in_flight.is_none() {
            return false;
        }
        self.in_flight = None;
        self.consecutive_successes = 0;
        self.consecutive_losses = self.consecutive_losses.saturating_add(1);

        if self.as_capable && self.consecutive_losses >= config.lost_pdelay_resp_thresh {
            self.as_capable = false;
            true
        } else {
            false
        }
    }
}

/// Scales a [`Duration`] by a fractional factor, needed for the
/// `neighborRateRatio` multiplication above; [`Duration`] otherwise only
/// supports the integer [`core::ops::Mul<i32>`].
impl core::ops::Mul<f64> for Duration {
    type Output = Duration;
    fn mul(self, rhs: f64) -> Duration {
        Duration::from_nanos((self.nanos() as f64 * rhs) as i128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    fn port_identity(n: u16) -> PortIdentity {
        PortIdentity {
            clock_identity: ClockIdentity([1; 8]),
            port_number: n,
        }
    }

    #[test]
    fn full_exchange_yields_measurement() {
        let mut state = PeerDelayState::default();
        let own = port_identity(1);

        state.request_sent(5);
        state.request_timestamped(5, Time::from_fixed_nanos(1_000));

        let outcome = state.response_received(
            5,
            own,
            own,
            WireTimestamp::from_time(Time::from_fixed_nanos(1_100)),
            Time::from_fixed_nanos(1_400),
        );
        assert!(matches!(outcome, PdelayOutcome::Pending));

        let outcome = state.response_follow_up_received(
            5,
            own,
            own,
            WireTimestamp::from_time(Time::from_fixed_nanos(1_200)),
        );
        assert!(matches!(outcome, PdelayOutcome::Measured { .. }));

        assert!(state.mean_delay().is_some());
    }

    #[test]
    fn lost_responses_eventually_clear_as_capable() {
        let mut state = PeerDelayState::default();
        state.as_capable = true;
        let config = PeerDelayConfig::default();

        assert!(!state.receipt_timeout(&config));
        state.in_flight = Some(InFlightExchange {
            sequence_id: 1,
            t1: None,
            t2: None,
            t3: None,
            t4: None,
        });
        assert!(!state.receipt_timeout(&config));
        state.in_flight = Some(InFlightExchange {
            sequence_id: 2,
            t1: None,
            t2: None,
            t3: None,
            t4: None,
        });
        assert!(!state.receipt_timeout(&config));
        state.in_flight = Some(InFlightExchange {
            sequence_id: 3,
            t1: None,
            t2: None,
            t3: None,
            t4: None,
        });
        assert!(state.receipt_timeout(&config));
        assert!(!state.as_capable());
    }

    #[test]
    fn promotion_requires_threshold_successes() {
        let mut state = PeerDelayState::default();
        let config = PeerDelayConfig::default();
        state.consecutive_successes = 1;
        assert!(!state.promote_if_ready(&config));
        state.consecutive_successes = 2;
        assert!(state.promote_if_ready(&config));
    }
}
