//! Sans-I/O protocol engine for a single-port IEEE 802.1AS (gPTP) clock.
//!
//! This crate never touches a socket, a hardware clock, or a thread. It
//! implements the state machine, message codec, peer-delay measurement,
//! servo and BMCA described by IEEE 802.1AS-2011, and hands the embedder
//! (`gptp-linux`, or any other platform) a stream of [`port::PortAction`]s
//! to carry out, scaled down to a single Ethernet port with no
//! boundary-clock topology.
#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

#[cfg(feature = "std")]
extern crate std;

pub mod bmc;
pub mod clock;
pub mod datastructures;
pub mod filters;
pub mod port;
pub mod time;
pub mod timer;

pub use clock::Clock;
pub use datastructures::WireFormatError;
pub use filters::Filter;
