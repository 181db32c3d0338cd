//! The timer-dispatch thread: a `std`-backed drive for
//! `gptp-core`'s sans-I/O [`gptp_core::timer::TimerQueue`], parking on a
//! `Condvar` until the next deadline or a new event is registered.
//!
//! The queue itself stays single-threaded (it is only ever touched while
//! the caller already holds the port lock); this module just supplies the
//! "wait until the next deadline, then wake the owner" loop, plus the
//! handle bookkeeping needed to turn a `PortAction::{Schedule,Cancel}Timer`
//! into `TimerQueue` calls.

use std::sync::{Condvar, Mutex};

use gptp_core::{
    time::{Duration, Time},
    timer::{ExpiredEvent, TimerHandle, TimerQueue, TimerType},
};

struct Shared {
    queue: TimerQueue,
    /// Bumped every time the queue's next deadline might have changed, so
    /// the dispatch thread's `wait_timeout` knows to recompute rather than
    /// sleep past a newly-armed earlier timer.
    generation: u64,
    shutdown: bool,
}

/// Thread-safe handle onto a [`TimerQueue`], shared between the port's
/// owning thread (which calls [`TimerDriver::schedule`]/[`TimerDriver::cancel`]
/// while holding the port lock) and the dispatch thread (which calls
/// [`TimerDriver::wait_next`]).
pub struct TimerDriver {
    shared: Mutex<Shared>,
    condvar: Condvar,
}

impl TimerDriver {
    pub fn new() -> Self {
        TimerDriver {
            shared: Mutex::new(Shared {
                queue: TimerQueue::new(),
                generation: 0,
                shutdown: false,
            }),
            condvar: Condvar::new(),
        }
    }

    pub fn schedule(&self, now: Time, delay: Duration, kind: TimerType, auto_delete: bool) {
        let mut shared = self.shared.lock().unwrap();
        shared.queue.add_event(now, delay, kind, auto_delete);
        shared.generation = shared.generation.wrapping_add(1);
        drop(shared);
        self.condvar.notify_all();
    }

    pub fn cancel(&self, kind: TimerType) {
        let mut shared = self.shared.lock().unwrap();
        shared.queue.cancel_by_type(kind);
        shared.generation = shared.generation.wrapping_add(1);
    }

    pub fn cancel_handle(&self, handle: TimerHandle) {
        let mut shared = self.shared.lock().unwrap();
        shared.queue.cancel(handle);
        shared.generation = shared.generation.wrapping_add(1);
    }

    pub fn shutdown(&self) {
        self.shared.lock().unwrap().shutdown = true;
        self.condvar.notify_all();
    }

    /// Block until either the earliest pending deadline passes or the
    /// queue changes underneath us (a new, possibly earlier, timer was
    /// armed), then return every event that is now expired. Empty with
    /// `now_fn` unchanged after a spurious wake is a normal outcome — the
    /// caller just loops.
    pub fn wait_next(
        &self,
        now_fn: impl Fn() -> Time,
    ) -> WaitOutcome {
        let mut shared = self.shared.lock().unwrap();
        loop {
            if shared.shutdown {
                return WaitOutcome::Shutdown;
            }

            let now = now_fn();
            let expired = shared.queue.poll_expired(now);
            if !expired.is_empty() {
                return WaitOutcome::Expired(expired.into_iter().collect());
            }

            let seen_generation = shared.generation;
            let wait = match shared.queue.next_deadline() {
                Some(deadline) if deadline > now => {
                    let remaining = (deadline - now).nanos().max(0) as u64;
                    std::time::Duration::from_nanos(remaining)
                }
                Some(_) => std::time::Duration::from_millis(0),
                None => std::time::Duration::from_secs(3600),
            };

            let (guard, _timeout) = self.condvar.wait_timeout(shared, wait).unwrap();
            shared = guard;
            if shared.generation != seen_generation {
                // Something changed; loop around to recompute rather than
                // trust the `wait` duration we slept for.
                continue;
            }
        }
    }
}

impl Default for TimerDriver {
    fn default() -> Self {
        Self::new()
    }
}

pub enum WaitOutcome {
    Expired(Vec<ExpiredEvent>),
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fires_after_delay() {
        let driver = Arc::new(TimerDriver::new());
        let start = Time::from_fixed_nanos(0);
        driver.schedule(start, Duration::from_millis(10), TimerType::SyncInterval, true);

        let later = start + Duration::from_millis(50);
        let outcome = driver.wait_next(move || later);
        match outcome {
            WaitOutcome::Expired(events) => assert_eq!(events.len(), 1),
            WaitOutcome::Shutdown => panic!("unexpected shutdown"),
        }
    }

    #[test]
    fn shutdown_unblocks_waiter() {
        let driver = Arc::new(TimerDriver::new());
        let d2 = Arc::clone(&driver);
        let handle = std::thread::spawn(move || d2.wait_next(Time::now));
        std::thread::sleep(std::time::Duration::from_millis(20));
        driver.shutdown();
        match handle.join().unwrap() {
            WaitOutcome::Shutdown => {}
            WaitOutcome::Expired(_) => panic!("expected shutdown"),
        }
    }
}
