//! The port state machine: the sans-I/O core that turns link,
//! timer and receive events into [`PortAction`]s for the embedder to carry
//! out. Scaled to a single Ethernet port with no boundary-clock topology
//! and no BMCA type-state split.

mod actions;
mod config;
mod counters;
mod measurement;
mod peer_delay;
mod persistent;
mod sequence_id;

pub use actions::{PortAction, PortActionIterator, TimestampContext};
pub use config::{AutomotiveConfig, PhyDelay, PortConfig};
pub use counters::Counters;
pub use measurement::Measurement;
pub use peer_delay::PeerDelayConfig;
pub use persistent::{PersistentState, PERSISTENT_STATE_LEN};

use actions::{actions, TimestampContextInner};
use peer_delay::{PdelayOutcome, PeerDelayState};
use sequence_id::SequenceIdGenerator;

use crate::{
    bmc::{AcceptAnyMaster, AcceptableMasterList, Bmca, RecommendedState},
    clock::Clock,
    datastructures::{
        common::{PortIdentity, WireTimestamp},
        messages::{
            AnnounceMessage, FollowUpMessage, Header, Message, MessageBody, MessageType,
            PDelayReqMessage, PDelayRespFollowUpMessage, PDelayRespMessage, SignalingMessage,
            SyncMessage,
        },
    },
    filters::Filter,
    time::{Duration, Interval, Time},
    timer::TimerType,
};

/// Payload carried while this port is `MASTER`. Empty for now; kept as a
/// struct rather than a unit variant so spec-driven per-state data (e.g. a
/// held announce sequence window) has somewhere to land without changing
/// the shape of [`PortState`] again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MasterData;

#[derive(Debug, Clone, Copy)]
struct PendingSync {
    sequence_id: u16,
    receive_time: Time,
}

/// Bookkeeping shared by `UNCALIBRATED` and `SLAVE`: which master this port
/// follows, its advertised intervals, and the in-progress Sync/Follow-Up
/// pairing.
#[derive(Debug, Clone)]
pub struct SlaveData {
    master_port_identity: PortIdentity,
    master_log_sync_interval: i8,
    master_log_announce_interval: i8,
    wrong_seq_id_counter: u32,
    last_sync_sequence_id: Option<u16>,
    pending_sync: Option<PendingSync>,
}

impl SlaveData {
    /// The port identity of the master currently being followed.
    pub fn master_port_identity(&self) -> PortIdentity {
        self.master_port_identity
    }

    fn new(
        master_port_identity: PortIdentity,
        master_log_sync_interval: i8,
        master_log_announce_interval: i8,
    ) -> Self {
        SlaveData {
            master_port_identity,
            master_log_sync_interval,
            master_log_announce_interval,
            wrong_seq_id_counter: 0,
            last_sync_sequence_id: None,
            pending_sync: None,
        }
    }
}

/// The port's current position in IEEE 802.1AS's transition table. The full
/// nine states are modeled, including the `PRE_MASTER`/`UNCALIBRATED`
/// transitional states a simplified four-state model would collapse away.
/// `UNCALIBRATED` and `SLAVE` both carry [`SlaveData`]: the port already
/// tracks Sync/Follow-Up pairs against the selected master while
/// uncalibrated, and is promoted to `SLAVE` in place once the first
/// measurement reaches the servo.
#[derive(Debug, Clone)]
pub enum PortState {
    Initializing,
    Faulty,
    Disabled,
    Listening,
    PreMaster,
    Master(MasterData),
    Passive,
    Uncalibrated(SlaveData),
    Slave(SlaveData),
}

impl PortState {
    /// Discriminant used by [`PersistentState`]; stable across releases
    /// since it is written to the persistence file.
    pub fn persistent_kind(&self) -> u8 {
        match self {
            PortState::Initializing => 0,
            PortState::Faulty => 1,
            PortState::Disabled => 2,
            PortState::Listening => 3,
            PortState::PreMaster => 4,
            PortState::Master(_) => 5,
            PortState::Passive => 6,
            PortState::Uncalibrated(_) => 7,
            PortState::Slave(_) => 8,
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, PortState::PreMaster | PortState::Master(_))
    }

    pub fn is_slave(&self) -> bool {
        matches!(self, PortState::Uncalibrated(_) | PortState::Slave(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PortState::Initializing => "INITIALIZING",
            PortState::Faulty => "FAULTY",
            PortState::Disabled => "DISABLED",
            PortState::Listening => "LISTENING",
            PortState::PreMaster => "PRE_MASTER",
            PortState::Master(_) => "MASTER",
            PortState::Passive => "PASSIVE",
            PortState::Uncalibrated(_) => "UNCALIBRATED",
            PortState::Slave(_) => "SLAVE",
        }
    }
}

/// The single-port IEEE 802.1AS engine. Owns no socket, no thread and no
/// hardware clock handle beyond the [`Clock`] implementation it disciplines
/// through; every externally visible effect comes back as a [`PortAction`].
#[derive(Debug)]
pub struct Port<C: Clock, F: Filter, A: AcceptableMasterList = AcceptAnyMaster> {
    config: PortConfig,
    clock: C,
    servo: F,
    bmca: Bmca,
    acceptable_masters: A,

    state: PortState,
    link_up: bool,
    peer_delay: PeerDelayState,
    counters: Counters,

    seq_sync: SequenceIdGenerator,
    seq_announce: SequenceIdGenerator,
    seq_pdelay: SequenceIdGenerator,

    last_bmca_tick: Option<Time>,

    log_sync_interval: Interval,
    log_announce_interval: Interval,
    log_pdelay_interval: Interval,
    automotive_operational: bool,

    packet_buffer: [u8; 128],
}

impl<C: Clock, F: Filter> Port<C, F, AcceptAnyMaster> {
    /// Construct a new port accepting any BMCA-selected grandmaster.
    pub fn new(config: PortConfig, clock: C, filter_config: F::Config) -> Self {
        Self::with_acceptable_masters(config, clock, filter_config, AcceptAnyMaster)
    }
}

impl<C: Clock, F: Filter, A: AcceptableMasterList> Port<C, F, A> {
    pub fn with_acceptable_masters(
        config: PortConfig,
        clock: C,
        filter_config: F::Config,
        acceptable_masters: A,
    ) -> Self {
        let bmca = Bmca::new(config.port_identity);
        let log_sync_interval = config.log_sync_interval;
        let log_announce_interval = config.log_announce_interval;
        let log_pdelay_interval = config.log_pdelay_interval;

        Port {
            config,
            clock,
            servo: F::new(filter_config),
            bmca,
            acceptable_masters,
            state: PortState::Initializing,
            link_up: false,
            peer_delay: PeerDelayState::default(),
            counters: Counters::default(),
            seq_sync: SequenceIdGenerator::default(),
            seq_announce: SequenceIdGenerator::default(),
            seq_pdelay: SequenceIdGenerator::default(),
            last_bmca_tick: None,
            log_sync_interval,
            log_announce_interval,
            log_pdelay_interval,
            automotive_operational: false,
            packet_buffer: [0; 128],
        }
    }

    pub fn state(&self) -> &PortState {
        &self.state
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn as_capable(&self) -> bool {
        self.peer_delay.as_capable()
    }

    pub fn mean_link_delay(&self) -> Option<Duration> {
        self.peer_delay.mean_delay()
    }

    pub fn neighbor_rate_ratio(&self) -> f64 {
        self.peer_delay.neighbor_rate_ratio()
    }

    /// The most recent master↔local phase offset the servo observed, for
    /// IPC export; `None` until the first Sync/Follow-Up measurement lands.
    pub fn master_offset(&self) -> Option<Duration> {
        self.servo.current_offset()
    }

    /// The servo's currently applied master↔local frequency ratio.
    pub fn master_frequency_ratio(&self) -> f64 {
        self.servo.frequency_ratio()
    }

    /// The port identity of the master this port currently follows, if any
    /// (reported over the shared-memory IPC export).
    pub fn current_master(&self) -> Option<PortIdentity> {
        match &self.state {
            PortState::Slave(data) | PortState::Uncalibrated(data) => {
                Some(data.master_port_identity())
            }
            _ => None,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Seed this port's peer-delay estimate from a previously persisted
    /// state from a previous run. Only the peer-delay bookkeeping is
    /// restored; the port still starts `INITIALIZING`/`LISTENING` and
    /// re-runs BMCA and Pdelay exchanges rather than jumping straight back
    /// to the saved [`PortState`], since the master and sequence-id
    /// bookkeeping those states carry cannot be reconstructed from the
    /// persisted bytes alone.
    pub fn restore_persistent_state(&mut self, state: PersistentState) {
        self.peer_delay
            .restore(state.as_capable, state.one_way_delay, state.neighbor_rate_ratio);
    }

    /// Snapshot of the fields worth surviving a restart.
    pub fn persistent_state(&self) -> PersistentState {
        PersistentState {
            as_capable: self.peer_delay.as_capable(),
            port_state_kind: self.state.persistent_kind(),
            one_way_delay: self.peer_delay.mean_delay().unwrap_or(Duration::ZERO),
            neighbor_rate_ratio: self.peer_delay.neighbor_rate_ratio(),
        }
    }

    // ---- Power/link lifecycle (transition table) ----------

    pub fn handle_powerup(&mut self) -> PortActionIterator<'_> {
        self.handle_initialize()
    }

    pub fn handle_initialize(&mut self) -> PortActionIterator<'_> {
        self.state = PortState::Listening;
        self.link_up = true;
        let mut list = arrayvec::ArrayVec::new();
        if let Some(action) = self.pdelay_interval_action(Duration::ZERO) {
            list.push(action);
        }
        list.push(PortAction::ScheduleTimer {
            kind: TimerType::AnnounceReceiptTimeout,
            delay: self.announce_receipt_timeout(),
            auto_delete: true,
        });
        PortActionIterator::from(list)
    }

    pub fn handle_link_up(&mut self) -> PortActionIterator<'_> {
        if !matches!(self.state, PortState::Disabled) {
            return actions![];
        }
        self.link_up = true;
        self.state = PortState::Listening;
        let mut list = arrayvec::ArrayVec::new();
        if let Some(action) = self.pdelay_interval_action(Duration::ZERO) {
            list.push(action);
        }
        list.push(PortAction::ScheduleTimer {
            kind: TimerType::AnnounceReceiptTimeout,
            delay: self.announce_receipt_timeout(),
            auto_delete: true,
        });
        PortActionIterator::from(list)
    }

    pub fn handle_link_down(&mut self) -> PortActionIterator<'_> {
        self.link_up = false;
        self.peer_delay.link_down();
        self.state = PortState::Disabled;
        actions![
            PortAction::CancelTimer {
                kind: TimerType::PdelayInterval
            },
            PortAction::CancelTimer {
                kind: TimerType::PdelayRespReceiptTimeout
            },
            PortAction::CancelTimer {
                kind: TimerType::SyncInterval
            },
            PortAction::CancelTimer {
                kind: TimerType::AnnounceInterval
            },
        ]
    }

    pub fn handle_fault_detected(&mut self) -> PortActionIterator<'_> {
        self.state = PortState::Faulty;
        actions![
            PortAction::CancelTimer {
                kind: TimerType::PdelayInterval
            },
            PortAction::CancelTimer {
                kind: TimerType::SyncInterval
            },
            PortAction::CancelTimer {
                kind: TimerType::AnnounceInterval
            },
        ]
    }

    // ---- Timer expiry handlers ---------------------------------------

    pub fn handle_pdelay_interval_timeout(&mut self) -> PortActionIterator<'_> {
        if !self.link_up {
            return actions![];
        }
        let sequence_id = self.seq_pdelay.generate();
        self.peer_delay.request_sent(sequence_id);

        let header = self.event_header(MessageType::PDelayReq, sequence_id, true);
        let message = Message {
            header,
            body: MessageBody::PDelayReq(PDelayReqMessage {
                origin_timestamp: WireTimestamp::default(),
            }),
        };
        let len = self.encode(&message);
        self.counters.tx_pdelay_request += 1;

        let mut list = arrayvec::ArrayVec::new();
        list.push(PortAction::SendEvent {
            context: TimestampContext {
                inner: TimestampContextInner::PDelayReq { sequence_id },
            },
            data: &self.packet_buffer[..len],
        });
        list.push(PortAction::ScheduleTimer {
            kind: TimerType::PdelayRespReceiptTimeout,
            delay: Duration::from_log_interval(self.config.log_pdelay_interval.as_log_2()) * 2,
            auto_delete: true,
        });
        // Re-arm the next Pdelay-Req at the current (possibly
        // operator/automotive-adjusted) interval; the timer queue never
        // auto-reschedules this one (see `pdelay_interval_action`).
        if let Some(action) = self.pdelay_interval_action(self.log_pdelay_interval.as_duration()) {
            list.push(action);
        }
        PortActionIterator::from(list)
    }

    pub fn handle_pdelay_resp_receipt_timeout(&mut self) -> PortActionIterator<'_> {
        let demoted = self.peer_delay.receipt_timeout(&self.config.peer_delay);
        if demoted {
            self.counters.pdelay_allowed_lost_responses_exceeded += 1;
            if self.state.is_slave() {
                self.servo.restart_syntonization();
            }
        }
        actions![]
    }

    pub fn handle_sync_interval_timeout(&mut self) -> PortActionIterator<'_> {
        if !self.state.is_master() {
            return actions![];
        }
        let sequence_id = self.seq_sync.generate();
        let header = self.event_header(MessageType::Sync, sequence_id, true);
        let message = Message {
            header,
            body: MessageBody::Sync(SyncMessage {
                origin_timestamp: WireTimestamp::default(),
            }),
        };
        let len = self.encode(&message);
        self.counters.tx_sync += 1;

        let mut list = arrayvec::ArrayVec::new();
        list.push(PortAction::SendEvent {
            context: TimestampContext {
                inner: TimestampContextInner::Sync { sequence_id },
            },
            data: &self.packet_buffer[..len],
        });
        // Re-arm the next Sync at the current interval; see
        // `pdelay_interval_action` for why the timer queue doesn't do this
        // on its own.
        if let Some(action) = self.sync_interval_action(self.log_sync_interval.as_duration()) {
            list.push(action);
        }
        PortActionIterator::from(list)
    }

    pub fn handle_announce_interval_timeout(&mut self) -> PortActionIterator<'_> {
        if !self.state.is_master() {
            return actions![];
        }
        if self.config.automotive.is_some() {
            return self.send_automotive_signaling();
        }

        let sequence_id = self.seq_announce.generate();
        let header = self.general_header(MessageType::Announce, sequence_id);
        let message = Message {
            header,
            body: MessageBody::Announce(AnnounceMessage {
                origin_timestamp: WireTimestamp::default(),
                grandmaster_priority1: self.config.priority1,
                grandmaster_clock_quality: self.config.clock_quality,
                grandmaster_priority2: self.config.priority2,
                grandmaster_identity: self.config.port_identity.clock_identity,
                steps_removed: 0,
                ..Default::default()
            }),
        };
        let len = self.encode(&message);
        self.counters.tx_announce += 1;

        let mut list = arrayvec::ArrayVec::new();
        list.push(PortAction::SendGeneral {
            data: &self.packet_buffer[..len],
        });
        // Re-arm the next Announce at the current interval; see
        // `pdelay_interval_action` for why the timer queue doesn't do this
        // on its own.
        if let Some(action) = self.announce_interval_action(self.log_announce_interval.as_duration())
        {
            list.push(action);
        }
        PortActionIterator::from(list)
    }

    pub fn handle_announce_receipt_timeout(&mut self) -> PortActionIterator<'_> {
        self.counters.announce_receipt_timeouts += 1;
        if self.config.automotive.is_some() {
            // Fixed roles: the GM keeps mastering regardless, a fixed slave
            // keeps waiting for the link to recover rather than demoting
            // itself.
            return actions![];
        }
        self.run_bmca()
    }

    pub fn handle_sync_receipt_timeout(&mut self) -> PortActionIterator<'_> {
        self.counters.rx_sync_receipt_timeouts += 1;
        if !self.state.is_slave() {
            return actions![];
        }
        // No Sync has arrived within the expected window: fall back to the
        // same recommendation BMCA would reach with no qualified Announce.
        self.become_master(true)
    }

    pub fn handle_qualification_timeout(&mut self) -> PortActionIterator<'_> {
        if !matches!(self.state, PortState::PreMaster) {
            return actions![];
        }
        self.state = PortState::Master(MasterData::default());
        let mut list = arrayvec::ArrayVec::new();
        if let Some(action) = self.sync_interval_action(Duration::ZERO) {
            list.push(action);
        }
        if let Some(action) = self.announce_interval_action(Duration::ZERO) {
            list.push(action);
        }
        PortActionIterator::from(list)
    }

    // ---- TX timestamp completion --------------------------------------

    pub fn handle_send_timestamp(
        &mut self,
        context: TimestampContext,
        timestamp: Time,
    ) -> PortActionIterator<'_> {
        let timestamp = timestamp + self.config.phy_delay.tx;
        match context.inner {
            TimestampContextInner::Sync { sequence_id } => {
                let header = self.general_header(MessageType::FollowUp, sequence_id);
                let message = Message {
                    header,
                    body: MessageBody::FollowUp(FollowUpMessage {
                        precise_origin_timestamp: WireTimestamp::from_time(timestamp),
                    }),
                };
                let len = self.encode(&message);
                self.counters.tx_follow_up += 1;
                actions![PortAction::SendGeneral {
                    data: &self.packet_buffer[..len],
                }]
            }
            TimestampContextInner::PDelayReq { sequence_id } => {
                self.peer_delay.request_timestamped(sequence_id, timestamp);
                actions![]
            }
            TimestampContextInner::PDelayResp {
                sequence_id,
                requestor_identity,
            } => {
                let header = self.general_header(MessageType::PDelayRespFollowUp, sequence_id);
                let message = Message {
                    header,
                    body: MessageBody::PDelayRespFollowUp(PDelayRespFollowUpMessage {
                        response_origin_timestamp: WireTimestamp::from_time(timestamp),
                        requesting_port_identity: requestor_identity,
                    }),
                };
                let len = self.encode(&message);
                self.counters.tx_pdelay_response_follow_up += 1;
                actions![PortAction::SendGeneral {
                    data: &self.packet_buffer[..len],
                }]
            }
        }
    }

    // ---- Frame reception ------------------------------------------------

    /// Handle a received frame whose hardware RX `timestamp` was captured
    /// (Sync, Pdelay-Req, Pdelay-Resp).
    pub fn handle_event_receive(&mut self, data: &[u8], timestamp: Time) -> PortActionIterator<'_> {
        self.dispatch(data, Some(timestamp + self.config.phy_delay.rx))
    }

    /// Handle a received frame with no timestamp requirement (Follow-Up,
    /// Pdelay-Resp-Follow-Up, Announce, Signalling).
    pub fn handle_general_receive(&mut self, data: &[u8]) -> PortActionIterator<'_> {
        self.dispatch(data, None)
    }

    fn dispatch(&mut self, data: &[u8], timestamp: Option<Time>) -> PortActionIterator<'_> {
        let message = match Message::deserialize(data) {
            Ok(m) => m,
            Err(_) => {
                self.counters.rx_ptp_packet_discard += 1;
                return actions![];
            }
        };

        if message.header.domain_number != self.config.domain_number {
            return actions![];
        }

        match message.body {
            MessageBody::Sync(sync) => self.on_sync(&message.header, sync, timestamp),
            MessageBody::FollowUp(follow_up) => self.on_follow_up(&message.header, follow_up),
            MessageBody::PDelayReq(req) => self.on_pdelay_req(&message.header, req, timestamp),
            MessageBody::PDelayResp(resp) => self.on_pdelay_resp(&message.header, resp, timestamp),
            MessageBody::PDelayRespFollowUp(resp_fu) => {
                self.on_pdelay_resp_follow_up(&message.header, resp_fu)
            }
            MessageBody::Announce(announce) => self.on_announce(&message.header, announce),
            MessageBody::Signaling(signaling) => self.on_signaling(&message.header, signaling),
        }
    }

    fn on_sync(
        &mut self,
        header: &Header,
        sync: SyncMessage,
        timestamp: Option<Time>,
    ) -> PortActionIterator<'_> {
        self.counters.rx_sync += 1;
        let Some(t2) = timestamp else {
            return actions![];
        };
        if !self.state.is_slave() {
            return actions![];
        }

        let one_step = !header.two_step_flag();
        if self.note_sync_sequence(header.sequence_id) {
            return actions![];
        }

        if one_step {
            if !self.accept_correction_field(header.correction_field) {
                self.counters.rx_ptp_packet_discard += 1;
                return actions![];
            }
            let master_time = sync.origin_timestamp.to_time()
                + header.correction_field
                + self.peer_delay.mean_delay().unwrap_or(Duration::ZERO);
            self.apply_measurement(t2, master_time)
        } else {
            if let PortState::Slave(data) | PortState::Uncalibrated(data) = &mut self.state {
                data.pending_sync = Some(PendingSync {
                    sequence_id: header.sequence_id,
                    receive_time: t2,
                });
            }
            actions![]
        }
    }

    fn on_follow_up(
        &mut self,
        header: &Header,
        follow_up: FollowUpMessage,
    ) -> PortActionIterator<'_> {
        self.counters.rx_follow_up += 1;
        let data = match &mut self.state {
            PortState::Slave(d) | PortState::Uncalibrated(d) => d,
            _ => return actions![],
        };
        let Some(pending) = data.pending_sync else {
            return actions![];
        };
        if pending.sequence_id != header.sequence_id {
            self.counters.rx_ptp_packet_discard += 1;
            return actions![];
        }
        data.pending_sync = None;

        if !self.accept_correction_field(header.correction_field) {
            self.counters.rx_ptp_packet_discard += 1;
            return actions![];
        }

        let master_time = follow_up.precise_origin_timestamp.to_time()
            + header.correction_field
            + self.peer_delay.mean_delay().unwrap_or(Duration::ZERO);
        self.apply_measurement(pending.receive_time, master_time)
    }

    /// Rejects a negative `correctionField` unless `allowNegativeCorrField`
    /// is set, per spec: a negative correction is peer misbehavior severe
    /// enough to discard the message, unless the operator has explicitly
    /// opted into tolerating it.
    fn accept_correction_field(&self, correction_field: Duration) -> bool {
        if correction_field.nanos() >= 0 {
            return true;
        }
        if self.config.peer_delay.allow_negative_correction {
            log::debug!(
                "accepting negative correctionField {correction_field} (allowNegativeCorrField set)"
            );
            true
        } else {
            log::warn!("rejecting message with negative correctionField {correction_field}");
            false
        }
    }

    fn apply_measurement(&mut self, event_time: Time, master_time: Time) -> PortActionIterator<'_> {
        let measurement = Measurement {
            event_time,
            master_offset: master_time - event_time,
            mean_delay: self.peer_delay.mean_delay(),
        };
        let _ = self.servo.measurement(measurement, &mut self.clock);

        // First measurement while UNCALIBRATED promotes straight to SLAVE,
        // carrying the same bookkeeping forward.
        self.state = match core::mem::replace(&mut self.state, PortState::Faulty) {
            PortState::Uncalibrated(data) => PortState::Slave(data),
            other => other,
        };
        actions![]
    }

    fn note_sync_sequence(&mut self, sequence_id: u16) -> bool {
        let data = match &mut self.state {
            PortState::Slave(d) | PortState::Uncalibrated(d) => d,
            _ => return false,
        };
        let wrong = match data.last_sync_sequence_id {
            Some(last) => sequence_id.wrapping_sub(last) != 1,
            None => false,
        };
        data.last_sync_sequence_id = Some(sequence_id);

        if wrong && self.peer_delay.as_capable() {
            data.wrong_seq_id_counter += 1;
        } else if !wrong {
            data.wrong_seq_id_counter = 0;
        }
        data.wrong_seq_id_counter >= self.config.sync_receipt_threshold
    }

    fn on_pdelay_req(
        &mut self,
        header: &Header,
        _req: PDelayReqMessage,
        timestamp: Option<Time>,
    ) -> PortActionIterator<'_> {
        self.counters.rx_pdelay_request += 1;
        let Some(t2) = timestamp else {
            return actions![];
        };
        if !self.link_up {
            return actions![];
        }

        let requestor_identity = header.source_port_identity;
        let response_header = self.event_header(MessageType::PDelayResp, header.sequence_id, true);

        let message = Message {
            header: response_header,
            body: MessageBody::PDelayResp(PDelayRespMessage {
                request_receipt_timestamp: WireTimestamp::from_time(t2),
                requesting_port_identity: requestor_identity,
            }),
        };
        let len = self.encode(&message);
        self.counters.tx_pdelay_response += 1;

        actions![PortAction::SendEvent {
            context: TimestampContext {
                inner: TimestampContextInner::PDelayResp {
                    sequence_id: header.sequence_id,
                    requestor_identity,
                },
            },
            data: &self.packet_buffer[..len],
        }]
    }

    fn on_pdelay_resp(
        &mut self,
        header: &Header,
        resp: PDelayRespMessage,
        timestamp: Option<Time>,
    ) -> PortActionIterator<'_> {
        self.counters.rx_pdelay_response += 1;
        let Some(t4) = timestamp else {
            return actions![];
        };
        if resp.requesting_port_identity == self.config.port_identity {
            self.peer_delay.note_peer(header.source_port_identity);
        }
        let outcome = self.peer_delay.response_received(
            header.sequence_id,
            resp.requesting_port_identity,
            self.config.port_identity,
            resp.request_receipt_timestamp,
            t4,
        );
        self.handle_pdelay_outcome(outcome)
    }

    fn on_pdelay_resp_follow_up(
        &mut self,
        header: &Header,
        resp_fu: PDelayRespFollowUpMessage,
    ) -> PortActionIterator<'_> {
        self.counters.rx_pdelay_response_follow_up += 1;
        if resp_fu.requesting_port_identity == self.config.port_identity {
            self.peer_delay.note_peer(header.source_port_identity);
        }
        let outcome = self.peer_delay.response_follow_up_received(
            header.sequence_id,
            resp_fu.requesting_port_identity,
            self.config.port_identity,
            resp_fu.response_origin_timestamp,
        );
        self.handle_pdelay_outcome(outcome)
    }

    fn handle_pdelay_outcome(&mut self, outcome: PdelayOutcome) -> PortActionIterator<'_> {
        if let PdelayOutcome::Measured { mean_delay } = outcome {
            if mean_delay.abs() <= self.config.neighbor_prop_delay_threshold {
                self.peer_delay.promote_if_ready(&self.config.peer_delay);
            } else {
                log::warn!(
                    "measured peer delay {mean_delay} exceeds neighborPropDelayThreshold {}, clearing asCapable",
                    self.config.neighbor_prop_delay_threshold
                );
                self.peer_delay.exceed_threshold();
            }
        }
        actions![]
    }

    fn on_announce(&mut self, header: &Header, announce: AnnounceMessage) -> PortActionIterator<'_> {
        self.counters.rx_announce += 1;
        if self.config.automotive.is_some() {
            return actions![];
        }
        if !self
            .acceptable_masters
            .is_acceptable(announce.grandmaster_identity)
        {
            return actions![];
        }

        let now = self.clock.now();
        let step = match self.last_bmca_tick {
            Some(last) => now - last,
            None => Duration::ZERO,
        };
        self.last_bmca_tick = Some(now);
        self.bmca.step_age(step, self.log_announce_interval);
        self.bmca
            .register_announce(header, &announce, self.log_announce_interval);

        self.run_bmca()
    }

    fn on_signaling(
        &mut self,
        _header: &Header,
        signaling: SignalingMessage,
    ) -> PortActionIterator<'_> {
        let targeted = signaling.target_port_identity == self.config.port_identity
            || signaling.target_port_identity.port_number == SignalingMessage::WILDCARD_PORT_NUMBER;
        if !targeted || self.config.automotive.is_none() {
            return actions![];
        }
        if let Some(tlv) = signaling.interval_request {
            self.log_sync_interval = Interval::from_log_2(tlv.time_sync_interval);
            self.automotive_operational = true;
        }
        actions![]
    }

    fn send_automotive_signaling(&mut self) -> PortActionIterator<'_> {
        use crate::datastructures::messages::IntervalRequestTlv;

        let Some(automotive) = self.config.automotive else {
            return actions![];
        };
        let operational_sync = automotive.operational_log_sync_interval.as_log_2();
        let operational_pdelay = automotive.operational_log_pdelay_interval.as_log_2();

        let header = self.general_header(MessageType::Signaling, self.seq_announce.generate());
        let message = Message {
            header,
            body: MessageBody::Signaling(SignalingMessage {
                target_port_identity: PortIdentity {
                    clock_identity: self.config.port_identity.clock_identity,
                    port_number: SignalingMessage::WILDCARD_PORT_NUMBER,
                },
                interval_request: Some(IntervalRequestTlv {
                    link_delay_interval: operational_pdelay,
                    time_sync_interval: operational_sync,
                    announce_interval: self.config.log_announce_interval.as_log_2(),
                    flags: 0,
                }),
            }),
        };
        let len = self.encode(&message);
        self.automotive_operational = true;
        self.log_sync_interval = automotive.operational_log_sync_interval;

        let mut list = arrayvec::ArrayVec::new();
        list.push(PortAction::SendGeneral {
            data: &self.packet_buffer[..len],
        });
        if let Some(action) = self.announce_interval_action(self.log_announce_interval.as_duration())
        {
            list.push(action);
        }
        PortActionIterator::from(list)
    }

    // ---- BMCA -----------------------------------------------------------

    fn run_bmca(&mut self) -> PortActionIterator<'_> {
        let own_data = self.config.local_clock_dataset();
        match self.bmca.recommended_state(&own_data) {
            RecommendedState::Master => {
                if self.state.is_master() {
                    actions![]
                } else {
                    self.become_master(true)
                }
            }
            RecommendedState::Slave {
                master_port_identity,
                announce,
            } => {
                let already_following = matches!(
                    &self.state,
                    PortState::Slave(data) | PortState::Uncalibrated(data)
                        if data.master_port_identity == master_port_identity
                );
                if already_following {
                    actions![]
                } else {
                    self.become_slave(master_port_identity, &announce, true)
                }
            }
        }
    }

    fn become_master(&mut self, announce: bool) -> PortActionIterator<'_> {
        self.state = if self.config.pre_master_duration.nanos() > 0 {
            PortState::PreMaster
        } else {
            PortState::Master(MasterData::default())
        };

        let mut list = arrayvec::ArrayVec::new();
        list.push(PortAction::CancelTimer {
            kind: TimerType::SyncReceiptTimeout,
        });
        list.push(PortAction::CancelTimer {
            kind: TimerType::AnnounceReceiptTimeout,
        });

        if matches!(self.state, PortState::PreMaster) {
            list.push(PortAction::ScheduleTimer {
                kind: TimerType::QualificationTimeout,
                delay: self.config.pre_master_duration,
                auto_delete: true,
            });
        } else if announce {
            if let Some(action) = self.sync_interval_action(Duration::ZERO) {
                list.push(action);
            }
            if let Some(action) = self.announce_interval_action(Duration::ZERO) {
                list.push(action);
            }
        }
        PortActionIterator::from(list)
    }

    fn become_slave(
        &mut self,
        master_port_identity: PortIdentity,
        announce: &AnnounceMessage,
        restart_syntonization: bool,
    ) -> PortActionIterator<'_> {
        let _ = announce;
        let slave_data = SlaveData::new(
            master_port_identity,
            self.log_sync_interval.as_log_2(),
            self.log_announce_interval.as_log_2(),
        );
        self.state = PortState::Uncalibrated(slave_data);

        if restart_syntonization {
            self.servo.restart_syntonization();
        }

        actions![
            PortAction::CancelTimer {
                kind: TimerType::SyncInterval
            },
            PortAction::CancelTimer {
                kind: TimerType::AnnounceInterval
            },
            PortAction::ScheduleTimer {
                kind: TimerType::SyncReceiptTimeout,
                delay: self.sync_receipt_timeout(),
                auto_delete: true,
            },
            PortAction::ScheduleTimer {
                kind: TimerType::AnnounceReceiptTimeout,
                delay: self.announce_receipt_timeout(),
                auto_delete: true,
            },
        ]
    }

    /// Arms the next `PdelayInterval` fire `delay` from now, unless
    /// `logPdelayInterval` is `LOG2_INTERVAL_INVALID` (disabled). Always
    /// scheduled `auto_delete: true`: the timer queue's own periodic
    /// rescheduling would freeze the dispatch thread on a zero-length
    /// interval (see `TimerQueue::poll_expired`), so
    /// `handle_pdelay_interval_timeout` re-arms this itself every time it
    /// fires, using whatever interval currently applies.
    fn pdelay_interval_action(&self, delay: Duration) -> Option<PortAction<'static>> {
        if self.log_pdelay_interval.is_disabled() {
            return None;
        }
        Some(PortAction::ScheduleTimer {
            kind: TimerType::PdelayInterval,
            delay,
            auto_delete: true,
        })
    }

    /// Arms the next `SyncInterval` fire `delay` from now, unless
    /// `logSyncInterval` is disabled. See `pdelay_interval_action` for why
    /// this is always one-shot and re-armed by the handler.
    fn sync_interval_action(&self, delay: Duration) -> Option<PortAction<'static>> {
        if self.log_sync_interval.is_disabled() {
            return None;
        }
        Some(PortAction::ScheduleTimer {
            kind: TimerType::SyncInterval,
            delay,
            auto_delete: true,
        })
    }

    /// Arms the next `AnnounceInterval` fire `delay` from now, unless
    /// `logAnnounceInterval` is disabled. See `pdelay_interval_action` for
    /// why this is always one-shot and re-armed by the handler.
    fn announce_interval_action(&self, delay: Duration) -> Option<PortAction<'static>> {
        if self.log_announce_interval.is_disabled() {
            return None;
        }
        Some(PortAction::ScheduleTimer {
            kind: TimerType::AnnounceInterval,
            delay,
            auto_delete: true,
        })
    }

    fn sync_receipt_timeout(&self) -> Duration {
        self.log_sync_interval.as_duration() * self.config.receipt_timeout_multiplier as i32
    }

    fn announce_receipt_timeout(&self) -> Duration {
        self.log_announce_interval.as_duration() * self.config.receipt_timeout_multiplier as i32
    }

    // ---- Wire helpers -----------------------------------------------------

    fn event_header(&self, message_type: MessageType, sequence_id: u16, two_step: bool) -> Header {
        let mut header = self.general_header(message_type, sequence_id);
        header.set_two_step_flag(two_step);
        header
    }

    fn general_header(&self, message_type: MessageType, sequence_id: u16) -> Header {
        Header {
            transport_specific: 1,
            message_type,
            version_ptp: 2,
            message_length: 0,
            domain_number: self.config.domain_number,
            flag_field: 0,
            correction_field: Duration::ZERO,
            source_port_identity: self.config.port_identity,
            sequence_id,
            control_field: 0,
            log_message_interval: self.log_message_interval_for(message_type),
        }
    }

    fn log_message_interval_for(&self, message_type: MessageType) -> i8 {
        match message_type {
            MessageType::Sync | MessageType::FollowUp => self.log_sync_interval.as_log_2(),
            MessageType::Announce => self.log_announce_interval.as_log_2(),
            MessageType::PDelayReq | MessageType::PDelayResp | MessageType::PDelayRespFollowUp => {
                self.log_pdelay_interval.as_log_2()
            }
            _ => crate::time::LOG2_INTERVAL_INVALID,
        }
    }

    fn encode(&mut self, message: &Message) -> usize {
        message
            .serialize(&mut self.packet_buffer)
            .expect("packet_buffer is sized for the largest gPTP message")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        datastructures::common::{ClockIdentity, ClockQuality, PortIdentity},
        filters::{Servo, ServoConfig},
    };

    #[derive(Debug)]
    struct TestClock {
        now: Time,
    }

    impl Clock for TestClock {
        type Error = core::convert::Infallible;

        fn now(&self) -> Time {
            self.now
        }

        fn step_clock(&mut self, offset: Duration) -> Result<Time, Self::Error> {
            self.now = self.now + offset;
            Ok(self.now)
        }

        fn set_frequency(&mut self, _ppm: f64) -> Result<Time, Self::Error> {
            Ok(self.now)
        }

        fn set_properties(
            &mut self,
            _properties: &crate::clock::ClockProperties,
        ) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn port_identity(n: u16) -> PortIdentity {
        PortIdentity {
            clock_identity: ClockIdentity([1; 8]),
            port_number: n,
        }
    }

    fn config() -> PortConfig {
        PortConfig {
            port_identity: port_identity(1),
            domain_number: 0,
            priority1: 128,
            priority2: 128,
            clock_quality: ClockQuality::default(),
            log_announce_interval: Interval::ONE_SECOND,
            log_sync_interval: Interval::ONE_SECOND,
            log_pdelay_interval: Interval::ONE_SECOND,
            receipt_timeout_multiplier: 3,
            sync_receipt_threshold: 5,
            neighbor_prop_delay_threshold: Duration::from_nanos(800),
            peer_delay: PeerDelayConfig::default(),
            pre_master_duration: Duration::ZERO,
            phy_delay: PhyDelay::default(),
            automotive: None,
        }
    }

    fn new_port() -> Port<TestClock, Servo> {
        Port::new(
            config(),
            TestClock {
                now: Time::from_fixed_nanos(0),
            },
            ServoConfig::default(),
        )
    }

    #[test]
    fn powerup_enters_listening() {
        let mut port = new_port();
        let actions: arrayvec::ArrayVec<_, 4> = port.handle_powerup().collect();
        assert!(matches!(port.state(), PortState::Listening));
        assert!(!actions.is_empty());
    }

    #[test]
    fn no_foreign_master_becomes_master_on_announce_receipt_timeout() {
        let mut port = new_port();
        let _ = port.handle_powerup();
        let _ = port.handle_announce_receipt_timeout();
        assert!(port.state().is_master());
    }

    #[test]
    fn link_down_disables_and_clears_as_capable() {
        let mut port = new_port();
        let _ = port.handle_powerup();
        let _ = port.handle_link_down();
        assert!(matches!(port.state(), PortState::Disabled));
        assert!(!port.as_capable());
    }

    #[test]
    fn pdelay_interval_timeout_emits_request_and_arms_receipt_timeout() {
        let mut port = new_port();
        let _ = port.handle_powerup();
        let actions: arrayvec::ArrayVec<_, 4> = port.handle_pdelay_interval_timeout().collect();
        assert_eq!(actions.len(), 2);
        assert_eq!(port.counters().tx_pdelay_request, 1);
    }
}
