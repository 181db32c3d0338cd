//! Generic delayed-callback queue.
//!
//! The sans-I/O port never owns this queue itself — it only returns
//! `ScheduleTimer`/`CancelTimer` actions (see [`crate::port::actions`]) — so
//! the queue lives here as an executor-agnostic data structure an embedder
//! drives. `gptp-linux` wraps it in a dispatch thread; tests can step it
//! synchronously.

use crate::time::{Duration, Time};

/// Opaque handle returned by [`TimerQueue::add_event`], unique among
/// currently pending events of the queue that produced it.
pub type TimerHandle = u32;

/// The kind of event a pending timer will raise on expiry. One queue
/// instance typically serves a single port and may have several of these
/// pending at once ("events of the same type may co-exist").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerType {
    PdelayInterval,
    PdelayReqReceiptTimeout,
    PdelayRespReceiptTimeout,
    SyncInterval,
    SyncReceiptTimeout,
    AnnounceInterval,
    AnnounceReceiptTimeout,
    /// Hold timer for the `PRE_MASTER` transitional state.
    QualificationTimeout,
}

#[derive(Debug, Clone, Copy)]
struct PendingEvent {
    handle: TimerHandle,
    kind: TimerType,
    deadline: Time,
    interval: Duration,
    auto_delete: bool,
}

/// An event that has reached its deadline and is ready for the embedder to
/// feed back into the port as the corresponding `*_EXPIRES` input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredEvent {
    pub handle: TimerHandle,
    pub kind: TimerType,
}

/// A queue of delayed events keyed by `(type, handle)`, as specified by
/// the port state machine expects. Not thread-safe by itself; `gptp-linux` serializes access to
/// it under the port lock, consistent with the single logical owner model
/// of the embedder.
#[derive(Debug, Default)]
pub struct TimerQueue {
    events: arrayvec::ArrayVec<PendingEvent, 32>,
    next_handle: TimerHandle,
}

impl TimerQueue {
    pub fn new() -> Self {
        TimerQueue {
            events: arrayvec::ArrayVec::new(),
            next_handle: 0,
        }
    }

    /// Schedule `kind` to fire `delay` after `now`. If `auto_delete` is
    /// false the event reschedules itself for another `delay` each time it
    /// fires, until explicitly cancelled; otherwise it fires once and is
    /// freed. Returns the handle the caller can later pass to
    /// [`TimerQueue::cancel`].
    pub fn add_event(
        &mut self,
        now: Time,
        delay: Duration,
        kind: TimerType,
        auto_delete: bool,
    ) -> Option<TimerHandle> {
        let handle = self.next_handle;
        let event = PendingEvent {
            handle,
            kind,
            deadline: now + delay,
            interval: delay,
            auto_delete,
        };
        self.events.try_push(event).ok()?;
        self.next_handle = self.next_handle.wrapping_add(1);
        Some(handle)
    }

    /// Cancel a single pending event by its handle.
    pub fn cancel(&mut self, handle: TimerHandle) {
        self.events.retain(|e| e.handle != handle);
    }

    /// Cancel every pending event of the given type, regardless of handle
    /// ("cancellation by type removes all of them").
    pub fn cancel_by_type(&mut self, kind: TimerType) {
        self.events.retain(|e| e.kind != kind);
    }

    /// Remove and return every event whose deadline is at or before `now`.
    /// A missed tick fires at most once, with no catch-up, since an event
    /// is only ever represented once in the queue regardless of how many
    /// deadlines it has passed.
    ///
    /// A periodic event (`auto_delete: false`) only reschedules itself if
    /// its interval is strictly positive: an interval of zero (or negative)
    /// would reinsert the event with a deadline that is already `<= now`,
    /// which this same pass would immediately observe as expired again,
    /// looping forever since the queue's length never shrinks. Callers are
    /// expected to arm genuinely periodic timers with a real interval and
    /// reschedule one-shot `ZERO`-delay "fire immediately" events
    /// themselves from the handler; this is a backstop against a
    /// misconfigured interval, not the primary mechanism.
    pub fn poll_expired(&mut self, now: Time) -> arrayvec::ArrayVec<ExpiredEvent, 32> {
        let mut expired = arrayvec::ArrayVec::new();
        let mut i = 0;
        while i < self.events.len() {
            if self.events[i].deadline <= now {
                let mut event = self.events.remove(i);
                let _ = expired.try_push(ExpiredEvent {
                    handle: event.handle,
                    kind: event.kind,
                });
                if !event.auto_delete && event.interval > Duration::ZERO {
                    event.deadline = now + event.interval;
                    let _ = self.events.try_push(event);
                }
            } else {
                i += 1;
            }
        }
        expired
    }

    /// The earliest deadline among pending events, if any — what an
    /// embedder's dispatch thread should sleep until.
    pub fn next_deadline(&self) -> Option<Time> {
        self.events.iter().map(|e| e.deadline).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_delete_event_fires_once() {
        let mut queue = TimerQueue::new();
        let now = Time::from_fixed_nanos(0);
        queue.add_event(now, Duration::from_millis(100), TimerType::PdelayInterval, true);

        let later = Time::from_fixed_nanos(200_000_000);
        let expired = queue.poll_expired(later);
        assert_eq!(expired.len(), 1);
        assert!(queue.poll_expired(later).is_empty());
    }

    #[test]
    fn periodic_event_reschedules() {
        let mut queue = TimerQueue::new();
        let now = Time::from_fixed_nanos(0);
        queue.add_event(now, Duration::from_millis(100), TimerType::SyncInterval, false);

        let t1 = Time::from_fixed_nanos(150_000_000);
        assert_eq!(queue.poll_expired(t1).len(), 1);

        let t2 = Time::from_fixed_nanos(260_000_000);
        assert_eq!(queue.poll_expired(t2).len(), 1);
    }

    #[test]
    fn zero_interval_periodic_event_does_not_reschedule() {
        let mut queue = TimerQueue::new();
        let now = Time::from_fixed_nanos(0);
        queue.add_event(now, Duration::ZERO, TimerType::PdelayInterval, false);

        // A single poll must terminate and must not leave the event
        // re-armed at an already-expired deadline.
        let expired = queue.poll_expired(now);
        assert_eq!(expired.len(), 1);
        assert!(queue.poll_expired(now).is_empty());
    }

    #[test]
    fn cancel_by_type_removes_coexisting_events() {
        let mut queue = TimerQueue::new();
        let now = Time::from_fixed_nanos(0);
        queue.add_event(now, Duration::from_millis(10), TimerType::PdelayInterval, true);
        queue.add_event(now, Duration::from_millis(20), TimerType::PdelayInterval, true);
        queue.add_event(now, Duration::from_millis(10), TimerType::SyncInterval, true);

        queue.cancel_by_type(TimerType::PdelayInterval);

        let later = Time::from_fixed_nanos(1_000_000_000);
        assert_eq!(queue.poll_expired(later).len(), 1);
    }
}
