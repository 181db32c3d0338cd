//! The side effects a [`Port`](super::Port) asks its embedder to perform.
//!
//! The port never touches the network, a clock, or the timer queue
//! directly — sans-I/O by construction. Every state transition instead
//! returns a small, fixed-size list of [`PortAction`]s for the embedder to
//! carry out; this is what lets the same state machine run against a
//! Linux raw socket, a test harness, or anything else.

use arrayvec::ArrayVec;

use crate::{datastructures::common::PortIdentity, timer::TimerType};

/// Identifies a packet that was handed to the embedder with
/// [`PortAction::SendEvent`] so its hardware-captured TX timestamp can
/// later be reported back via
/// [`Port::handle_send_timestamp`](super::Port::handle_send_timestamp).
///
/// Deliberately non-`Copy`/non-`Clone`: exactly one timestamp report must
/// correspond to each `SendEvent`.
#[derive(Debug)]
pub struct TimestampContext {
    pub(super) inner: TimestampContextInner,
}

#[derive(Debug)]
pub(super) enum TimestampContextInner {
    Sync { sequence_id: u16 },
    PDelayReq { sequence_id: u16 },
    PDelayResp {
        sequence_id: u16,
        requestor_identity: PortIdentity,
    },
}

/// A side effect a port state transition needs the embedder to perform.
#[derive(Debug)]
#[must_use]
pub enum PortAction<'a> {
    /// Send a message whose transmit timestamp must be captured in
    /// hardware and reported back via [`TimestampContext`]; used for
    /// Sync, Pdelay-Req and Pdelay-Resp.
    SendEvent {
        context: TimestampContext,
        data: &'a [u8],
    },
    /// Send a message with no timestamp requirement: Follow-Up,
    /// Pdelay-Resp-Follow-Up, Announce, Signalling.
    SendGeneral { data: &'a [u8] },
    /// Register `kind` on the timer queue to fire after `delay`.
    ScheduleTimer {
        kind: TimerType,
        delay: crate::time::Duration,
        auto_delete: bool,
    },
    /// Cancel every pending timer of this type.
    CancelTimer { kind: TimerType },
}

const MAX_ACTIONS: usize = 4;

/// An iterator over the [`PortAction`]s produced by one call into
/// [`Port`](super::Port). Every state-handling method returns one of
/// these, even when empty.
#[derive(Debug)]
#[must_use]
pub struct PortActionIterator<'a> {
    actions: <ArrayVec<PortAction<'a>, MAX_ACTIONS> as IntoIterator>::IntoIter,
}

impl<'a> PortActionIterator<'a> {
    pub fn empty() -> Self {
        PortActionIterator {
            actions: ArrayVec::new().into_iter(),
        }
    }

    pub(super) fn from(actions: ArrayVec<PortAction<'a>, MAX_ACTIONS>) -> Self {
        PortActionIterator {
            actions: actions.into_iter(),
        }
    }

    pub(super) fn single(action: PortAction<'a>) -> Self {
        let mut actions = ArrayVec::new();
        actions.push(action);
        Self::from(actions)
    }
}

impl<'a> Iterator for PortActionIterator<'a> {
    type Item = PortAction<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.actions.next()
    }
}

/// Builds a [`PortActionIterator`] from a list of [`PortAction`] expressions;
/// used throughout [`Port`](super::Port)'s `handle_*` methods.
macro_rules! actions {
    [] => {
        $crate::port::actions::PortActionIterator::empty()
    };
    [$action:expr] => {
        $crate::port::actions::PortActionIterator::single($action)
    };
    [$($action:expr),+ $(,)?] => {{
        let mut list = arrayvec::ArrayVec::new();
        $(list.push($action);)+
        $crate::port::actions::PortActionIterator::from(list)
    }};
}

pub(super) use actions;
