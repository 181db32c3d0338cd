//! Types that describe points in time ([`Time`]), and durations between two
//! instants ([`Duration`], [`Interval`]).
//!
//! These are used throughout `gptp-core` instead of [`std::time`] types
//! because they match the on-the-wire 80-bit PTP timestamp representation
//! (48-bit seconds, 32-bit nanoseconds) and because arithmetic between them
//! needs to be signed, which [`std::time::Duration`] does not support.

mod duration;
mod instant;
mod interval;

pub use duration::Duration;
pub use instant::Time;
pub use interval::Interval;

/// Special value of a log-interval field that disables the corresponding
/// timer (IEEE 1588 Table 21 footnote).
pub const LOG2_INTERVAL_INVALID: i8 = -127;
