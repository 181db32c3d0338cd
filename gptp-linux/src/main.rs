//! Entry point: parses the CLI/INI configuration, opens the network and
//! clock resources, and runs the single logical port thread that owns
//! [`gptp_core::port::Port`]. Three helper threads (RX, timer-dispatch,
//! link-watch — plus signal handling) post events onto one channel; this
//! thread is the only one that ever calls into the port.

use std::sync::{mpsc, Arc};

use clap::Parser;

use gptp_core::{
    bmc::AcceptableMasterList,
    clock::Clock as _,
    datastructures::common::{ClockIdentity, ClockQuality, PortIdentity},
    filters::{Servo, ServoConfig},
    port::{AutomotiveConfig, PeerDelayConfig, PhyDelay, Port, PortAction, PortConfig},
    time::{Duration, Interval},
    timer::TimerType,
};

use gptp_linux::{
    cli::Args,
    clock::{self, LinuxClock},
    config::{self, FileConfig},
    ipc::{SharedMemoryIpc, TimeData},
    link_watch::{self, LinkEvent},
    network::EthernetPort,
    persistence, signals,
    sync::ReentrantMutex,
    timer::{TimerDriver, WaitOutcome},
};

/// Restricts which grandmasters a port will accept, implementing the `-T`/
/// `-L` CLI overrides on top of the same [`AcceptableMasterList`] seam
/// `gptp-core` exposes for embedder-side master filtering.
///
/// `Forced` rejects every foreign Announce, so `LISTENING`'s
/// announce-receipt timeout — "no qualified announces" — is the only path
/// out, which always resolves to `MASTER`. There is no equivalent
/// mechanical forcing for `-L`: IEEE 802.1AS only reaches `SLAVE` by
/// comparing a real qualified Announce, so `-L` is honored by leaving BMCA
/// free to run (`Open`) rather than fabricating a foreign master dataset.
enum MasterFilter {
    Open,
    Forced,
}

impl AcceptableMasterList for MasterFilter {
    fn is_acceptable(&self, _identity: ClockIdentity) -> bool {
        matches!(self, MasterFilter::Open)
    }
}

/// Every source that can cause a port state transition funnels through
/// this enum onto the single event channel the port thread reads from.
enum Event {
    Received {
        data: Vec<u8>,
        timestamp: gptp_core::time::Time,
        is_event: bool,
    },
    TimerExpired(TimerType),
    Link(LinkEvent),
    Signal(signals::SignalEvent),
}

fn main() {
    let args = Args::parse();

    let level = if args.test_mode {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };
    gptp_linux::setup_logger(level, args.test_mode).expect("failed to initialize logging");

    if let Err(e) = run(args) {
        tracing::error!("fatal: {e}");
        std::process::exit(1);
    }
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("network error: {0}")]
    Network(#[from] gptp_linux::network::NetworkError),
    #[error("IPC error: {0}")]
    Ipc(#[from] gptp_linux::ipc::IpcError),
    #[error("persistence error: {0}")]
    Persistence(#[from] gptp_linux::persistence::PersistError),
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
    #[error("failed to start link watcher: {0}")]
    LinkWatch(#[source] std::io::Error),
}

fn run(args: Args) -> Result<(), RunError> {
    let file_config = match &args.config_file {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };

    // `ifname` is a required positional argument, so it is always present
    // on the command line; per `daemon_cl.cpp`'s precedence the CLI wins
    // over `[eth] ifname` in the config file, which exists only for parity
    // with that file format.
    let ifname = args.ifname.clone();
    let phy_delay = resolve_phy_delay(&args, &file_config)?;

    let (clock, hardware_timestamping) = clock::open_for_interface(&ifname);
    let network = EthernetPort::open(&ifname, hardware_timestamping, clock.clone())?;
    let clock_identity = ClockIdentity::from_mac_address(network.source_mac());

    let priority1 = args.priority1.or(file_config.priority1).unwrap_or(248);

    let automotive = args.automotive.then(|| AutomotiveConfig {
        is_grandmaster: args.grandmaster,
        operational_log_sync_interval: Interval::from_log_2(
            args.oper_log_sync_interval.unwrap_or(0),
        ),
        operational_log_pdelay_interval: Interval::from_log_2(
            args.oper_log_pdelay_interval.unwrap_or(0),
        ),
    });

    let peer_delay = file_config.peer_delay_config(PeerDelayConfig {
        log_pdelay_interval: args.init_log_pdelay_interval.unwrap_or(0),
        allow_negative_correction: args.allow_negative_correction,
        ..PeerDelayConfig::default()
    });

    let neighbor_prop_delay_threshold = file_config
        .neighbor_prop_delay_thresh
        .map(|ns| Duration::from_nanos(ns as i128))
        .unwrap_or(Duration::from_nanos(800));

    let sync_receipt_threshold = file_config.sync_receipt_thresh.unwrap_or(5);
    let receipt_timeout_multiplier = file_config
        .announce_receipt_timeout
        .or(file_config.sync_receipt_timeout)
        .unwrap_or(3);

    let port_config = PortConfig {
        port_identity: PortIdentity {
            clock_identity,
            port_number: 1,
        },
        domain_number: 0,
        priority1,
        priority2: 248,
        clock_quality: ClockQuality::default(),
        log_announce_interval: Interval::ONE_SECOND,
        log_sync_interval: Interval::from_log_2(args.init_log_sync_interval.unwrap_or(0)),
        log_pdelay_interval: Interval::from_log_2(args.init_log_pdelay_interval.unwrap_or(0)),
        receipt_timeout_multiplier,
        sync_receipt_threshold,
        neighbor_prop_delay_threshold,
        peer_delay,
        pre_master_duration: Duration::ZERO,
        phy_delay,
        automotive,
    };

    if args.force_slave && automotive.is_none() {
        tracing::warn!(
            "-L requests a forced SLAVE state, but IEEE 802.1AS only enters SLAVE against a \
             qualified Announce; BMCA runs normally and will follow the first one that qualifies"
        );
    }

    let master_filter = if args.force_master && automotive.is_none() {
        MasterFilter::Forced
    } else {
        MasterFilter::Open
    };

    let servo_config = ServoConfig {
        enabled: args.syntonize,
        ..ServoConfig::default()
    };
    if !args.syntonize {
        tracing::info!("-S not given: measuring offset/delay only, clock will not be disciplined");
    }

    let mut port: Port<LinuxClock, Servo, MasterFilter> =
        Port::with_acceptable_masters(port_config, clock.clone(), servo_config, master_filter);

    if let Some(path) = &args.persistence_file {
        if let Some(state) = persistence::load(path)? {
            port.restore_persistent_state(state);
            tracing::info!("restored persistent state from {}", path.display());
        }
    }

    let ipc = SharedMemoryIpc::open(args.ipc_group.as_deref())?;

    let (tx, rx) = mpsc::channel::<Event>();
    let timer_driver = Arc::new(TimerDriver::new());
    let network = Arc::new(network);
    let port_lock = Arc::new(ReentrantMutex::new(()));

    spawn_rx_thread(Arc::clone(&network), tx.clone());
    spawn_timer_thread(Arc::clone(&timer_driver), clock.clone(), tx.clone());
    spawn_link_relay(ifname.clone(), tx.clone()).map_err(RunError::LinkWatch)?;
    spawn_signal_relay(tx.clone()).map_err(RunError::Signals)?;

    tracing::info!("gptp starting on {ifname}, clock identity {clock_identity}");

    {
        let _guard = port_lock.lock();
        let now = clock.now();
        let actions: Vec<_> = port.handle_powerup().collect();
        let pending = apply_actions(actions, &network, &timer_driver, now);
        feed_back_send_timestamps(&mut port, pending, &network, &timer_driver, now);
    }

    let mut last_counters_logged = std::time::Instant::now();

    loop {
        let event = match rx.recv() {
            Ok(event) => event,
            Err(_) => break,
        };

        let _guard = port_lock.lock();
        let now = clock.now();
        let mut shutting_down = false;

        let actions: Vec<_> = match event {
            Event::Received {
                data,
                timestamp,
                is_event,
            } => {
                if is_event {
                    port.handle_event_receive(&data, timestamp).collect()
                } else {
                    port.handle_general_receive(&data).collect()
                }
            }
            Event::TimerExpired(kind) => dispatch_timer(&mut port, kind),
            Event::Link(LinkEvent::Up) => port.handle_link_up().collect(),
            Event::Link(LinkEvent::Down) => port.handle_link_down().collect(),
            Event::Signal(signals::SignalEvent::Shutdown) => {
                tracing::info!("shutdown requested");
                if let Some(path) = &args.persistence_file {
                    if let Err(e) = persistence::save(path, port.persistent_state()) {
                        tracing::warn!("failed to save persistence file: {e}");
                    }
                }
                shutting_down = true;
                Vec::new()
            }
            Event::Signal(signals::SignalEvent::FlushPersistence) => {
                if let Some(path) = &args.persistence_file {
                    match persistence::save(path, port.persistent_state()) {
                        Ok(()) => tracing::info!("persisted state to {}", path.display()),
                        Err(e) => tracing::warn!("failed to save persistence file: {e}"),
                    }
                }
                Vec::new()
            }
            Event::Signal(signals::SignalEvent::DumpCounters) => {
                tracing::info!("counters:\n{}", port.counters());
                Vec::new()
            }
        };

        let pending = apply_actions(actions, &network, &timer_driver, now);
        feed_back_send_timestamps(&mut port, pending, &network, &timer_driver, now);

        publish_ipc(&ipc, &port, clock_identity);

        if last_counters_logged.elapsed() > std::time::Duration::from_secs(60) {
            tracing::debug!("counters:\n{}", port.counters());
            last_counters_logged = std::time::Instant::now();
        }

        drop(_guard);
        if shutting_down {
            break;
        }
    }

    timer_driver.shutdown();
    tracing::info!("gptp shutdown complete");
    Ok(())
}

fn resolve_phy_delay(args: &Args, file_config: &FileConfig) -> Result<PhyDelay, RunError> {
    if let Some(raw) = &args.phy_delay {
        return Ok(config::parse_phy_delay(raw)?);
    }
    Ok(file_config.phy_delay.unwrap_or_default())
}

/// Turns one timer-queue `(type, handle)` expiry into the matching
/// `handle_*_timeout_expires`/`handle_*_interval_timeout` call on the port.
fn dispatch_timer(
    port: &mut Port<LinuxClock, Servo, MasterFilter>,
    kind: TimerType,
) -> Vec<PortAction<'_>> {
    match kind {
        TimerType::PdelayInterval => port.handle_pdelay_interval_timeout().collect(),
        TimerType::PdelayRespReceiptTimeout | TimerType::PdelayReqReceiptTimeout => {
            port.handle_pdelay_resp_receipt_timeout().collect()
        }
        TimerType::SyncInterval => port.handle_sync_interval_timeout().collect(),
        TimerType::SyncReceiptTimeout => port.handle_sync_receipt_timeout().collect(),
        TimerType::AnnounceInterval => port.handle_announce_interval_timeout().collect(),
        TimerType::AnnounceReceiptTimeout => port.handle_announce_receipt_timeout().collect(),
        TimerType::QualificationTimeout => port.handle_qualification_timeout().collect(),
    }
}

/// Applies every action from one batch, returning the `(context, timestamp)`
/// pairs of any event sends so their TX completion can be fed back into
/// [`Port::handle_send_timestamp`] once this batch's borrow of `port` ends.
///
/// `network.send` blocks until the kernel hands back the frame's actual TX
/// timestamp (see [`EthernetPort::send`]), so the pairing is exact: the
/// timestamp returned here is the one that belongs in the matching Follow-Up
/// or Pdelay-Resp-Follow-Up, not an estimate.
fn apply_actions<'a>(
    actions: impl IntoIterator<Item = PortAction<'a>>,
    network: &EthernetPort,
    timer_driver: &TimerDriver,
    now: gptp_core::time::Time,
) -> Vec<(gptp_core::port::TimestampContext, gptp_core::time::Time)> {
    let mut pending = Vec::new();
    for action in actions {
        match action {
            PortAction::SendEvent { context, data } => match network.send(data) {
                Ok(timestamp) => pending.push((context, timestamp)),
                Err(e) => tracing::warn!("send failed: {e}"),
            },
            PortAction::SendGeneral { data } => {
                if let Err(e) = network.send(data) {
                    tracing::warn!("send failed: {e}");
                }
            }
            PortAction::ScheduleTimer {
                kind,
                delay,
                auto_delete,
            } => timer_driver.schedule(now, delay, kind, auto_delete),
            PortAction::CancelTimer { kind } => timer_driver.cancel(kind),
        }
    }
    pending
}

/// Delivers each pending TX timestamp to the port and applies the resulting
/// Follow-Up / Pdelay-Resp-Follow-Up send. Must only run after the action
/// batch that produced `pending` has been fully consumed and dropped, since
/// `handle_send_timestamp` needs `port` back by mutable reference.
fn feed_back_send_timestamps(
    port: &mut Port<LinuxClock, Servo, MasterFilter>,
    pending: Vec<(gptp_core::port::TimestampContext, gptp_core::time::Time)>,
    network: &EthernetPort,
    timer_driver: &TimerDriver,
    now: gptp_core::time::Time,
) {
    for (context, timestamp) in pending {
        let actions: Vec<_> = port.handle_send_timestamp(context, timestamp).collect();
        let more = apply_actions(actions, network, timer_driver, now);
        debug_assert!(
            more.is_empty(),
            "handle_send_timestamp never itself produces a further SendEvent"
        );
    }
}

fn spawn_link_relay(ifname: String, tx: mpsc::Sender<Event>) -> std::io::Result<()> {
    let (link_tx, link_rx) = mpsc::channel();
    link_watch::spawn(ifname, link_tx)?;
    std::thread::Builder::new()
        .name("gptp-link-relay".into())
        .spawn(move || {
            while let Ok(event) = link_rx.recv() {
                if tx.send(Event::Link(event)).is_err() {
                    break;
                }
            }
        })?;
    Ok(())
}

fn spawn_signal_relay(tx: mpsc::Sender<Event>) -> std::io::Result<()> {
    let (sig_tx, sig_rx) = mpsc::channel();
    signals::spawn(sig_tx)?;
    std::thread::Builder::new()
        .name("gptp-signal-relay".into())
        .spawn(move || {
            while let Ok(event) = sig_rx.recv() {
                let shutdown = matches!(event, signals::SignalEvent::Shutdown);
                if tx.send(Event::Signal(event)).is_err() || shutdown {
                    break;
                }
            }
        })?;
    Ok(())
}

fn spawn_rx_thread(network: Arc<EthernetPort>, tx: mpsc::Sender<Event>) {
    std::thread::Builder::new()
        .name("gptp-rx".into())
        .spawn(move || loop {
            match network.recv() {
                Ok(frame) => {
                    let is_event = message_needs_rx_timestamp(&frame.data);
                    let event = Event::Received {
                        data: frame.data,
                        timestamp: frame.timestamp,
                        is_event,
                    };
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("receive failed: {e}"),
            }
        })
        .expect("failed to spawn RX thread");
}

/// Sync, Pdelay-Req and Pdelay-Resp need their RX timestamp fed back to
/// the port; Follow-Up, Pdelay-Resp-Follow-Up, Announce and Signalling do
/// not. Peeking at the header's message-type nibble avoids a second full
/// parse for routing a frame that the port itself will parse anyway.
fn message_needs_rx_timestamp(data: &[u8]) -> bool {
    match data.first() {
        Some(&b) => matches!(b & 0x0F, 0x0 | 0x2 | 0x3),
        None => false,
    }
}

fn spawn_timer_thread(driver: Arc<TimerDriver>, clock: LinuxClock, tx: mpsc::Sender<Event>) {
    std::thread::Builder::new()
        .name("gptp-timer".into())
        .spawn(move || loop {
            match driver.wait_next(|| clock.now()) {
                WaitOutcome::Expired(events) => {
                    for expired in events {
                        if tx.send(Event::TimerExpired(expired.kind)).is_err() {
                            return;
                        }
                    }
                }
                WaitOutcome::Shutdown => return,
            }
        })
        .expect("failed to spawn timer-dispatch thread");
}

fn publish_ipc(
    ipc: &SharedMemoryIpc,
    port: &Port<LinuxClock, Servo, MasterFilter>,
    clock_identity: ClockIdentity,
) {
    let mut data = TimeData::default();
    data.set_clock_identity(clock_identity);
    data.set_grandmaster(
        port.current_master()
            .map(|id| id.clock_identity)
            .unwrap_or(clock_identity),
    );
    data.set_counters(port.counters());
    data.set_port_state(port.state());
    data.as_capable = port.as_capable();
    if let Some(offset) = port.master_offset() {
        data.ml_phoffset = offset.nanos() as i64;
    }
    data.ml_freqoffset = port.master_frequency_ratio();
    // This daemon disciplines the PHC directly with no separate "system"
    // clock in the loop, so local and system coincide: ls_phoffset stays 0
    // and ls_freqoffset stays the identity ratio (TimeData::default()'s
    // zero bit pattern already gives 0.0 here, set explicitly for clarity).
    data.ls_freqoffset = 1.0;
    data.local_time = port.clock().now().as_nanos() as u64;
    data.process_id = std::process::id() as i32;
    ipc.update(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_message_type_selects_rx_timestamp_need() {
        // Sync (0x0) needs a timestamp; Follow-Up (0x8) does not.
        assert!(message_needs_rx_timestamp(&[0x00]));
        assert!(!message_needs_rx_timestamp(&[0x08]));
        // Pdelay-Req (0x2) and Pdelay-Resp (0x3) need one; Pdelay-Resp-
        // Follow-Up (0xA) does not.
        assert!(message_needs_rx_timestamp(&[0x02]));
        assert!(message_needs_rx_timestamp(&[0x03]));
        assert!(!message_needs_rx_timestamp(&[0x0A]));
    }

    #[test]
    fn empty_frame_is_not_an_event_message() {
        assert!(!message_needs_rx_timestamp(&[]));
    }

    #[test]
    fn master_filter_rejects_everything_when_forced() {
        let forced = MasterFilter::Forced;
        assert!(!forced.is_acceptable(ClockIdentity([1; 8])));
        let open = MasterFilter::Open;
        assert!(open.is_acceptable(ClockIdentity([1; 8])));
    }
}
