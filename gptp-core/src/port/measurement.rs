use crate::time::{Duration, Time};

/// One `(master_time, local_time)` sample handed to the [`Filter`](
/// crate::filters::Filter) by the sync pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Local receive time the master offset was computed against.
    pub event_time: Time,
    /// `master_time - event_time`.
    pub master_offset: Duration,
    /// Current peer-delay estimate, if the peer-delay loop has one,
    /// surfaced to the filter/IPC for diagnostics.
    pub mean_delay: Option<Duration>,
}
