use super::Duration;

/// A log2-seconds representation used throughout PTP to describe the pacing
/// of periodic events (`logSyncInterval`, `logAnnounceInterval`, ...).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Interval(i8);

impl core::fmt::Debug for Interval {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Interval")
            .field("seconds", &self.seconds())
            .field("log_base_2", &self.0)
            .finish()
    }
}

impl Interval {
    /// An interval of one second.
    pub const ONE_SECOND: Self = Self(0);

    /// IEEE 1588 Table 21: `logInterval = -127` disables the corresponding
    /// timer.
    pub const DISABLED: Self = Self(super::LOG2_INTERVAL_INVALID);

    pub const fn from_log_2(log_2: i8) -> Self {
        Self(log_2)
    }

    pub const fn as_log_2(self) -> i8 {
        self.0
    }

    pub fn is_disabled(self) -> bool {
        self.0 == super::LOG2_INTERVAL_INVALID
    }

    /// Turn `self` into a number of seconds as [`f64`].
    ///
    /// # Example
    /// ```
    /// # use gptp_core::time::Interval;
    /// assert_eq!(Interval::from_log_2(1).seconds(), 2.0);
    /// assert_eq!(Interval::from_log_2(-1).seconds(), 0.5);
    /// ```
    pub fn seconds(self) -> f64 {
        libm::pow(2.0, self.0 as f64)
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_interval(self)
    }

    pub fn as_core_duration(self) -> core::time::Duration {
        core::time::Duration::from_secs_f64(self.seconds())
    }
}

impl From<i8> for Interval {
    fn from(value: i8) -> Self {
        Self::from_log_2(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_seconds() {
        assert_eq!(Interval::from_log_2(1).seconds(), 2.0f64);
    }

    #[test]
    fn disabled_sentinel() {
        assert!(Interval::DISABLED.is_disabled());
        assert!(!Interval::ONE_SECOND.is_disabled());
    }
}
