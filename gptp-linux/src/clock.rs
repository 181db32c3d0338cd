//! Linux implementation of [`gptp_core::clock::Clock`], backed by a PTP
//! hardware clock (or the system realtime clock as a fallback) via
//! `clock-steering`.

use std::path::Path;

use clock_steering::{unix::UnixClock, Clock as SteeringClock, TimeOffset, Timestamp};
use gptp_core::{
    clock::{Clock, ClockProperties},
    datastructures::common::TimeSource,
    time::{Duration, Time},
};

#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("clock ioctl failed: {0}")]
    Steering(#[from] clock_steering::unix::Error),
}

/// Adapts a `clock-steering` clock to the `gptp-core` [`Clock`] trait,
/// converting between the wire-shaped [`Time`]/[`Duration`] and
/// `clock-steering`'s own [`Timestamp`]/[`TimeOffset`].
///
/// `UnixClock` identifies a clock device (realtime or a `/dev/ptpN`) rather
/// than buffering any in-process state, so cloning it yields a second handle
/// onto the same underlying clock rather than a divergent copy — the port's
/// servo and the network layer's TX-timestamp reader each hold their own
/// clone and stay consistent with each other.
#[derive(Clone)]
pub struct LinuxClock {
    inner: UnixClock,
}

impl LinuxClock {
    pub fn realtime() -> Self {
        LinuxClock {
            inner: UnixClock::CLOCK_REALTIME,
        }
    }

    pub fn open(path: &Path) -> Result<Self, ClockError> {
        Ok(LinuxClock {
            inner: UnixClock::open(path)?,
        })
    }
}

fn timestamp_to_time(ts: Timestamp) -> Time {
    Time::from_fixed_nanos(ts.seconds as i128 * 1_000_000_000 + ts.nanos as i128)
}

fn duration_to_offset(d: Duration) -> TimeOffset {
    let nanos = d.nanos();
    TimeOffset {
        seconds: (nanos.div_euclid(1_000_000_000)) as i64,
        nanos: nanos.rem_euclid(1_000_000_000) as i32,
    }
}

impl Clock for LinuxClock {
    type Error = ClockError;

    fn now(&self) -> Time {
        match self.inner.now() {
            Ok(ts) => timestamp_to_time(ts),
            Err(e) => {
                log::warn!("failed to read clock: {e}");
                Time::default()
            }
        }
    }

    fn step_clock(&mut self, offset: Duration) -> Result<Time, Self::Error> {
        let ts = self.inner.step_clock(duration_to_offset(offset))?;
        Ok(timestamp_to_time(ts))
    }

    fn set_frequency(&mut self, ppm: f64) -> Result<Time, Self::Error> {
        let ts = self.inner.set_frequency(ppm)?;
        Ok(timestamp_to_time(ts))
    }

    fn set_properties(&mut self, properties: &ClockProperties) -> Result<(), Self::Error> {
        let leap = if properties.leap61 {
            1
        } else if properties.leap59 {
            -1
        } else {
            0
        };
        self.inner.set_leap_seconds(leap)?;
        Ok(())
    }
}

/// Converts the originating [`TimeSource`] into the closest `clock-steering`
/// quality hint, used only for the shared-memory IPC export.
pub fn time_source_name(source: TimeSource) -> &'static str {
    match source {
        TimeSource::Atomic => "atomic",
        TimeSource::Gps => "gps",
        TimeSource::TerrestrialRadio => "terrestrial-radio",
        TimeSource::Ptp => "ptp",
        TimeSource::Ntp => "ntp",
        TimeSource::HandSet => "hand-set",
        TimeSource::Other => "other",
        TimeSource::InternalOscillator => "internal-oscillator",
    }
}

/// Finds the PTP hardware clock device attached to `ifname` via the
/// `ETHTOOL_GET_TS_INFO` ioctl issued over `SIOCETHTOOL`, falling back to
/// the system realtime clock when the interface has no PHC or the query
/// fails.
pub fn open_for_interface(ifname: &str) -> (LinuxClock, bool) {
    match phc_device_for_interface(ifname) {
        Some(path) => match LinuxClock::open(&path) {
            Ok(clock) => {
                log::info!("using hardware clock {} for {ifname}", path.display());
                return (clock, true);
            }
            Err(e) => log::warn!("failed to open {}: {e}", path.display()),
        },
        None => log::info!("no PTP hardware clock found for {ifname}, using system clock"),
    }
    (LinuxClock::realtime(), false)
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct EthtoolTsInfo {
    cmd: u32,
    so_timestamping: u32,
    phc_index: i32,
    tx_types: u32,
    tx_reserved: [u32; 3],
    rx_filters: u32,
    rx_reserved: [u32; 3],
}

#[repr(C)]
struct IfReqEthtool {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    ifr_data: *mut libc::c_void,
}

const ETHTOOL_GET_TS_INFO: u32 = 0x41;

fn phc_device_for_interface(ifname: &str) -> Option<std::path::PathBuf> {
    use std::ffi::CString;

    let name = CString::new(ifname).ok()?;
    if name.as_bytes_with_nul().len() > libc::IFNAMSIZ {
        return None;
    }

    // SAFETY: AF_INET/SOCK_DGRAM sockets are only used here to issue an
    // ioctl and are closed before returning.
    let sock = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if sock < 0 {
        return None;
    }

    let mut info = EthtoolTsInfo {
        cmd: ETHTOOL_GET_TS_INFO,
        so_timestamping: 0,
        phc_index: -1,
        tx_types: 0,
        tx_reserved: [0; 3],
        rx_filters: 0,
        rx_reserved: [0; 3],
    };

    let mut ifr = IfReqEthtool {
        ifr_name: [0; libc::IFNAMSIZ],
        ifr_data: &mut info as *mut _ as *mut libc::c_void,
    };
    for (dst, src) in ifr.ifr_name.iter_mut().zip(name.as_bytes()) {
        *dst = *src as libc::c_char;
    }

    // SAFETY: `ifr` is a valid, correctly laid-out `struct ifreq` with an
    // embedded ethtool command buffer large enough for `ETHTOOL_GET_TS_INFO`.
    let res = unsafe { libc::ioctl(sock, libc::SIOCETHTOOL, &mut ifr) };
    unsafe { libc::close(sock) };

    if res != 0 || info.phc_index < 0 {
        return None;
    }

    Some(std::path::PathBuf::from(format!(
        "/dev/ptp{}",
        info.phc_index
    )))
}
