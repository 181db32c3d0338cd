use core::ops::{Add, Sub};

use super::Duration;

/// A point in time, represented the way PTP represents it on the wire: whole
/// seconds since the PTP epoch plus a nanosecond remainder.
///
/// Differences between two [`Time`] values are computed in 128-bit signed
/// nanoseconds (see [`Duration`]), so a `Time` itself only needs to represent
/// non-negative values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time {
    /// Whole seconds since the PTP epoch (fits the wire's 48-bit seconds
    /// field with room to spare).
    secs: u64,
    nanos: u32,
}

impl Time {
    pub const fn from_fixed_nanos(nanos: i128) -> Self {
        let nanos = if nanos < 0 { 0 } else { nanos };
        Time {
            secs: (nanos / 1_000_000_000) as u64,
            nanos: (nanos % 1_000_000_000) as u32,
        }
    }

    /// Construct from the wire's 48-bit-seconds/32-bit-nanos timestamp
    /// fields.
    pub const fn from_wire(seconds_ms: u16, seconds_ls: u32, nanoseconds: u32) -> Self {
        let secs = ((seconds_ms as u64) << 32) | seconds_ls as u64;
        Time {
            secs,
            nanos: nanoseconds,
        }
    }

    pub const fn to_wire(self) -> (u16, u32, u32) {
        (
            (self.secs >> 32) as u16,
            (self.secs & 0xFFFF_FFFF) as u32,
            self.nanos,
        )
    }

    pub fn as_nanos(self) -> i128 {
        self.secs as i128 * 1_000_000_000 + self.nanos as i128
    }
}

impl Add<Duration> for Time {
    type Output = Time;
    fn add(self, rhs: Duration) -> Time {
        Time::from_fixed_nanos(self.as_nanos() + rhs.nanos())
    }
}

impl Sub<Duration> for Time {
    type Output = Time;
    fn sub(self, rhs: Duration) -> Time {
        Time::from_fixed_nanos(self.as_nanos() - rhs.nanos())
    }
}

impl Sub for Time {
    type Output = Duration;
    fn sub(self, rhs: Time) -> Duration {
        Duration::from_nanos(self.as_nanos() - rhs.as_nanos())
    }
}

impl core::fmt::Display for Time {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:09}s", self.secs, self.nanos)
    }
}

#[cfg(feature = "std")]
impl Time {
    /// Current wall-clock time, useful for tests and for seeding a system
    /// clock implementation.
    pub fn now() -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Time::from_fixed_nanos(now.as_nanos() as i128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        let t = Time::from_wire(0x1234, 0x5678_9abc, 123_456_789);
        let (ms, ls, ns) = t.to_wire();
        assert_eq!((ms, ls, ns), (0x1234, 0x5678_9abc, 123_456_789));
    }

    #[test]
    fn signed_difference() {
        let a = Time::from_fixed_nanos(10);
        let b = Time::from_fixed_nanos(20);
        assert_eq!(a - b, Duration::from_nanos(-10));
    }
}
