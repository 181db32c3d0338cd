//! Clock servo: turns `(master_time, local_time)` measurements into phase
//! and frequency corrections.

mod servo;

pub use servo::{Servo, ServoConfig};

use crate::{clock::Clock, port::Measurement, time::Duration};

/// Tells the caller when [`Filter::update`] should be invoked again, and
/// surfaces the currently estimated one-way delay for diagnostics/IPC.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterUpdate {
    pub next_update: Option<core::time::Duration>,
    pub mean_delay: Option<Duration>,
}

/// A filter for post-processing time measurements into clock corrections.
///
/// The servo never touches the clock's phase or frequency directly; it
/// calls through [`Clock`] so the same servo logic runs against any
/// platform clock implementation.
pub trait Filter {
    /// Configuration used to construct a new instance via [`Filter::new`].
    type Config: Clone;

    fn new(config: Self::Config) -> Self;

    /// Feed a new `(master_time, local_time)` pair into the servo.
    fn measurement<C: Clock>(&mut self, m: Measurement, clock: &mut C) -> FilterUpdate;

    /// Periodic update driven by [`FilterUpdate::next_update`], independent
    /// of new measurements arriving.
    fn update<C: Clock>(&mut self, clock: &mut C) -> FilterUpdate;

    /// Discard all smoothed history (offset/frequency confidence windows)
    /// and resume from the next measurement, as required when
    /// synchronization restarts after a master change or a Pdelay outage.
    fn restart_syntonization(&mut self);

    /// The most recently observed master↔local phase offset, for diagnostics
    /// and IPC export. `None` before the first measurement.
    fn current_offset(&self) -> Option<Duration>;

    /// The smoothed, bounded master↔local frequency ratio (1.0 ≡ identical
    /// rate) the servo is currently applying.
    fn frequency_ratio(&self) -> f64;
}
