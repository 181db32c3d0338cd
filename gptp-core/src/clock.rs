//! The abstract interface between the port state machine and whatever
//! local oscillator it disciplines.

use crate::{datastructures::common::TimeSource, time::Time};

/// Timescale-related properties a grandmaster advertises and that a clock
/// implementation may need to apply to the local system (leap second
/// handling, UTC offset). Mirrors the fields of an [`AnnounceMessage`](
/// crate::datastructures::messages::AnnounceMessage) that describe the
/// timescale rather than the comparison dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockProperties {
    pub current_utc_offset: i16,
    pub current_utc_offset_valid: bool,
    pub leap59: bool,
    pub leap61: bool,
    pub time_traceable: bool,
    pub frequency_traceable: bool,
    pub time_source: TimeSource,
}

impl Default for ClockProperties {
    fn default() -> Self {
        ClockProperties {
            current_utc_offset: 37,
            current_utc_offset_valid: true,
            leap59: false,
            leap61: false,
            time_traceable: false,
            frequency_traceable: false,
            time_source: TimeSource::InternalOscillator,
        }
    }
}

/// Manipulation and querying interface onto the local clock a port
/// disciplines. The port state machine never touches a hardware or system
/// clock directly; it only calls through this trait, which a platform
/// crate (`gptp-linux::clock`) implements.
pub trait Clock {
    /// Error type returned by the fallible methods below.
    type Error: core::fmt::Debug;

    /// Current reading of the clock.
    fn now(&self) -> Time;

    /// Step the clock by `offset`, returning the time the step was applied
    /// at. Used when the accumulated phase offset exceeds the servo's step
    /// threshold rather than being slewed.
    fn step_clock(&mut self, offset: crate::time::Duration) -> Result<Time, Self::Error>;

    /// Set the clock's running rate to `ppm` parts-per-million away from
    /// its nominal frequency. Returns the time the change took effect.
    fn set_frequency(&mut self, ppm: f64) -> Result<Time, Self::Error>;

    /// Apply grandmaster timescale properties (UTC offset, leap indicator)
    /// to the extent the underlying clock supports it.
    fn set_properties(&mut self, properties: &ClockProperties) -> Result<(), Self::Error>;
}

#[cfg(feature = "std")]
impl<T: Clock + ?Sized> Clock for std::boxed::Box<T> {
    type Error = T::Error;

    fn now(&self) -> Time {
        self.as_ref().now()
    }

    fn step_clock(&mut self, offset: crate::time::Duration) -> Result<Time, Self::Error> {
        self.as_mut().step_clock(offset)
    }

    fn set_frequency(&mut self, ppm: f64) -> Result<Time, Self::Error> {
        self.as_mut().set_frequency(ppm)
    }

    fn set_properties(&mut self, properties: &ClockProperties) -> Result<(), Self::Error> {
        self.as_mut().set_properties(properties)
    }
}
