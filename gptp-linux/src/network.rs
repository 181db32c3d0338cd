//! Raw Ethernet transport: one `AF_PACKET`/`SOCK_DGRAM` socket
//! per port, bound to `ETH_P_89_3F` (0x88F8) and joined to the 802.1AS
//! multicast group `01:80:C2:00:00:0E`, with `SO_TIMESTAMPING` RX/TX
//! capture.
//!
//! An 802.1AS port sends Ethernet frames directly rather than UDP
//! datagrams, so this binds `AF_PACKET` instead of a UDP socket, but the
//! cmsg/`MSG_ERRQUEUE` dance for pulling `ScmTimestampsns` off a completed
//! send/receive is the same regardless of socket family.

use std::os::fd::{AsRawFd, BorrowedFd, RawFd};

use nix::{
    cmsg_space,
    errno::Errno,
    sys::socket::{
        recvmsg, setsockopt,
        sockopt::Timestamping,
        ControlMessageOwned, MsgFlags, SockaddrStorage, TimestampingFlag, Timestamps,
    },
};

use gptp_core::time::Time;

use crate::clock::LinuxClock;

/// gPTP's EtherType, assigned by IEEE 802.1AS.
pub const ETHERTYPE_GPTP: u16 = 0x88F8;
/// The 802.1AS "nearest bridge" multicast destination all gPTP frames use.
pub const GPTP_MULTICAST_MAC: [u8; 6] = [0x01, 0x80, 0xC2, 0x00, 0x00, 0x0E];

const READ_BUFFER_LEN: usize = 1500;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("interface {0:?} does not exist or has no index")]
    NoSuchInterface(String),
    #[error("interface {0:?} has no hardware (MAC) address")]
    NoHardwareAddress(String),
    #[error("socket() failed: {0}")]
    Socket(#[source] std::io::Error),
    #[error("bind() failed: {0}")]
    Bind(#[source] std::io::Error),
    #[error("failed to join the gPTP multicast group: {0}")]
    JoinMulticast(#[source] std::io::Error),
    #[error("failed to configure SO_TIMESTAMPING: {0}")]
    Timestamping(#[source] nix::Error),
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),
    #[error("receive failed: {0}")]
    Recv(#[source] nix::Error),
    #[error("received frame is too large to fit the read buffer")]
    FrameTooLarge,
}

/// A single received gPTP frame (the Ethernet payload only — header and
/// FCS are not included) plus the timestamp the kernel attached to it.
pub struct ReceivedFrame {
    pub data: Vec<u8>,
    pub timestamp: Time,
}

/// A bound, multicast-joined, timestamping-enabled raw Ethernet socket for
/// one network interface.
pub struct EthernetPort {
    fd: RawFd,
    ifindex: i32,
    source_mac: [u8; 6],
    hardware_timestamping: bool,
    clock: LinuxClock,
}

impl EthernetPort {
    /// Opens a raw `AF_PACKET`/`SOCK_DGRAM` socket bound to `ifname`,
    /// joins the gPTP multicast group, and enables either hardware or
    /// software RX/TX timestamping depending on `hardware_timestamping`.
    pub fn open(
        ifname: &str,
        hardware_timestamping: bool,
        clock: LinuxClock,
    ) -> Result<Self, NetworkError> {
        let ifindex = if_index(ifname)?;
        let source_mac = if_hwaddr(ifname)?;

        // SAFETY: a plain `socket(2)` call with constant, valid arguments.
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_DGRAM,
                (ETHERTYPE_GPTP as u16).to_be() as i32,
            )
        };
        if fd < 0 {
            return Err(NetworkError::Socket(std::io::Error::last_os_error()));
        }

        let mut sll: libc::sockaddr_ll = unsafe { core::mem::zeroed() };
        sll.sll_family = libc::AF_PACKET as u16;
        sll.sll_protocol = (ETHERTYPE_GPTP as u16).to_be();
        sll.sll_ifindex = ifindex;

        // SAFETY: `fd` was just opened above; `sll` is a validly
        // initialized `sockaddr_ll` of the documented size.
        let bind_rc = unsafe {
            libc::bind(
                fd,
                &sll as *const libc::sockaddr_ll as *const libc::sockaddr,
                core::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if bind_rc != 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(NetworkError::Bind(err));
        }

        if let Err(e) = join_multicast(fd, ifindex) {
            unsafe { libc::close(fd) };
            return Err(e);
        }

        let flags = if hardware_timestamping {
            TimestampingFlag::SOF_TIMESTAMPING_RAW_HARDWARE
                | TimestampingFlag::SOF_TIMESTAMPING_RX_HARDWARE
                | TimestampingFlag::SOF_TIMESTAMPING_TX_HARDWARE
        } else {
            TimestampingFlag::SOF_TIMESTAMPING_SOFTWARE
                | TimestampingFlag::SOF_TIMESTAMPING_RX_SOFTWARE
                | TimestampingFlag::SOF_TIMESTAMPING_TX_SOFTWARE
        };
        // SAFETY: `fd` is a valid, open socket.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        setsockopt(&borrowed, Timestamping, &flags).map_err(|e| {
            unsafe { libc::close(fd) };
            NetworkError::Timestamping(e)
        })?;

        Ok(EthernetPort {
            fd,
            ifindex,
            source_mac,
            hardware_timestamping,
            clock,
        })
    }

    pub fn source_mac(&self) -> [u8; 6] {
        self.source_mac
    }

    /// Sends `payload` as the body of a gPTP frame to the 802.1AS
    /// multicast address, then immediately retrieves the TX completion
    /// timestamp off the error queue (TX timestamp must be
    /// retrieved before the next action the caller takes, e.g. sending a
    /// matching Follow-Up).
    pub fn send(&self, payload: &[u8]) -> Result<Time, NetworkError> {
        let mut sll: libc::sockaddr_ll = unsafe { core::mem::zeroed() };
        sll.sll_family = libc::AF_PACKET as u16;
        sll.sll_protocol = (ETHERTYPE_GPTP as u16).to_be();
        sll.sll_ifindex = self.ifindex;
        sll.sll_halen = 6;
        sll.sll_addr[..6].copy_from_slice(&GPTP_MULTICAST_MAC);

        // SAFETY: `self.fd` is open; `payload` is a valid byte slice for
        // its own length; `sll` is a validly initialized destination
        // address of the documented size.
        let sent = unsafe {
            libc::sendto(
                self.fd,
                payload.as_ptr() as *const libc::c_void,
                payload.len(),
                0,
                &sll as *const libc::sockaddr_ll as *const libc::sockaddr,
                core::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if sent < 0 {
            return Err(NetworkError::Send(std::io::Error::last_os_error()));
        }

        self.recv_tx_timestamp()
    }

    /// Polls the socket error queue for the timestamp of the frame most
    /// recently handed to the kernel. Blocks briefly (the kernel attaches
    /// the completion almost immediately after `sendto` returns) by
    /// retrying `EWOULDBLOCK` a bounded number of times rather than
    /// spinning forever on a driver that never completes.
    fn recv_tx_timestamp(&self) -> Result<Time, NetworkError> {
        const MAX_ATTEMPTS: u32 = 1000;
        let mut read_buf = [0u8; 0];
        let mut io_vec = [std::io::IoSliceMut::new(&mut read_buf)];

        for _ in 0..MAX_ATTEMPTS {
            let mut cmsg = cmsg_space!(Timestamps);
            match recvmsg::<SockaddrStorage>(
                self.fd,
                &mut io_vec,
                Some(&mut cmsg),
                MsgFlags::MSG_ERRQUEUE,
            ) {
                Ok(received) => {
                    if let Some(ts) = extract_timestamp(&received, self.hardware_timestamping) {
                        return Ok(ts);
                    }
                    continue;
                }
                Err(Errno::EWOULDBLOCK | Errno::EAGAIN) => {
                    std::thread::yield_now();
                    continue;
                }
                Err(e) => return Err(NetworkError::Recv(e)),
            }
        }

        // The driver never completed the send; fall back to the software
        // clock reading rather than block the port thread indefinitely.
        Ok(self.clock.now())
    }

    /// Blocking receive of the next gPTP frame on this socket, with the
    /// RX timestamp taken from `SO_TIMESTAMPING` (falling back to the
    /// software clock if the kernel didn't attach one).
    pub fn recv(&self) -> Result<ReceivedFrame, NetworkError> {
        let mut read_buf = [0u8; READ_BUFFER_LEN];
        let mut io_vec = [std::io::IoSliceMut::new(&mut read_buf)];
        let mut cmsg = cmsg_space!(Timestamps);

        let received = recvmsg::<SockaddrStorage>(
            self.fd,
            &mut io_vec,
            Some(&mut cmsg),
            MsgFlags::empty(),
        )
        .map_err(NetworkError::Recv)?;

        let timestamp =
            extract_timestamp(&received, self.hardware_timestamping).unwrap_or_else(|| self.clock.now());

        if received.bytes > READ_BUFFER_LEN {
            return Err(NetworkError::FrameTooLarge);
        }

        Ok(ReceivedFrame {
            data: read_buf[..received.bytes].to_vec(),
            timestamp,
        })
    }
}

impl AsRawFd for EthernetPort {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for EthernetPort {
    fn drop(&mut self) {
        // SAFETY: `self.fd` was opened in `open` and is owned by `self`.
        unsafe {
            libc::close(self.fd);
        }
    }
}

fn extract_timestamp(
    received: &nix::sys::socket::RecvMsg<'_, '_, SockaddrStorage>,
    hardware_timestamping: bool,
) -> Option<Time> {
    received.cmsgs().find_map(|cmsg| match cmsg {
        ControlMessageOwned::ScmTimestampsns(timestamps) => {
            let ts = if hardware_timestamping {
                timestamps.hw_raw
            } else {
                timestamps.system
            };
            Some(timespec_into_time(ts))
        }
        _ => None,
    })
}

fn timespec_into_time(ts: nix::sys::time::TimeSpec) -> Time {
    Time::from_fixed_nanos(ts.tv_sec() as i128 * 1_000_000_000 + ts.tv_nsec() as i128)
}

fn if_index(ifname: &str) -> Result<i32, NetworkError> {
    let name = std::ffi::CString::new(ifname).unwrap();
    // SAFETY: `name` is a valid NUL-terminated C string.
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if index == 0 {
        Err(NetworkError::NoSuchInterface(ifname.to_string()))
    } else {
        Ok(index as i32)
    }
}

fn if_hwaddr(ifname: &str) -> Result<[u8; 6], NetworkError> {
    // SAFETY: a plain local-only `AF_INET`/`SOCK_DGRAM` socket used solely
    // to issue `SIOCGIFHWADDR`, mirroring the ethtool ioctl pattern in
    // `clock.rs`'s `open_for_interface`.
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if fd < 0 {
        return Err(NetworkError::NoHardwareAddress(ifname.to_string()));
    }

    let mut ifr: libc::ifreq = unsafe { core::mem::zeroed() };
    for (dst, src) in ifr.ifr_name.iter_mut().zip(ifname.bytes()) {
        *dst = src as libc::c_char;
    }

    // SAFETY: `fd` is open; `ifr` is a validly initialized `ifreq`.
    let rc = unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR, &mut ifr) };
    unsafe { libc::close(fd) };
    if rc != 0 {
        return Err(NetworkError::NoHardwareAddress(ifname.to_string()));
    }

    // SAFETY: `ifr_hwaddr.sa_data` holds 6 bytes of hardware address
    // after a successful `SIOCGIFHWADDR`.
    let mut mac = [0u8; 6];
    unsafe {
        for (i, b) in mac.iter_mut().enumerate() {
            *b = ifr.ifr_ifru.ifru_hwaddr.sa_data[i] as u8;
        }
    }
    Ok(mac)
}

fn join_multicast(fd: RawFd, ifindex: i32) -> Result<(), NetworkError> {
    let mut mreq: libc::packet_mreq = unsafe { core::mem::zeroed() };
    mreq.mr_ifindex = ifindex;
    mreq.mr_type = libc::PACKET_MR_MULTICAST as u16;
    mreq.mr_alen = 6;
    mreq.mr_address[..6].copy_from_slice(&GPTP_MULTICAST_MAC.map(|b| b as i8 as u8));

    // SAFETY: `fd` is open; `mreq` is a validly initialized `packet_mreq`.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_PACKET,
            libc::PACKET_ADD_MEMBERSHIP,
            &mreq as *const libc::packet_mreq as *const libc::c_void,
            core::mem::size_of::<libc::packet_mreq>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        Err(NetworkError::JoinMulticast(std::io::Error::last_os_error()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multicast_constants_match_ieee_802_1as() {
        assert_eq!(GPTP_MULTICAST_MAC, [0x01, 0x80, 0xC2, 0x00, 0x00, 0x0E]);
        assert_eq!(ETHERTYPE_GPTP, 0x88F8);
    }

    #[test]
    fn timespec_conversion_is_exact() {
        let ts = nix::sys::time::TimeSpec::new(5, 250);
        let time = timespec_into_time(ts);
        assert_eq!(time.as_nanos(), 5_000_000_250);
    }
}
