//! The "port lock": a recursive mutex so a timer callback
//! started from within another callback (e.g. the qualification timer
//! arming the sync-interval timer) can re-enter without deadlocking the
//! thread that already holds it.
//!
//! `std::sync::Mutex` is not reentrant, so this wraps one with the owning
//! thread id and a recursion depth, following the same "single logical
//! owner, fixed lock order" discipline the embedder needs for
//! `port_lock -> timer_lock -> ipc_lock`.

use std::{
    cell::UnsafeCell,
    sync::{Mutex, MutexGuard},
    thread::ThreadId,
};

struct Owner {
    thread: Option<ThreadId>,
    depth: u32,
}

/// A recursive mutex: the thread currently holding the lock may acquire it
/// again without blocking. Only safe because every acquisition before the
/// outermost release stays on the same thread per the depth counter.
pub struct ReentrantMutex<T> {
    owner: Mutex<Owner>,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is only ever granted through `lock()`, which
// only returns a guard once this thread holds `owner` exclusively (either
// freshly acquired or already owning it), so concurrent access from two
// threads is impossible.
unsafe impl<T: Send> Sync for ReentrantMutex<T> {}

impl<T> ReentrantMutex<T> {
    pub fn new(value: T) -> Self {
        ReentrantMutex {
            owner: Mutex::new(Owner {
                thread: None,
                depth: 0,
            }),
            data: UnsafeCell::new(value),
        }
    }

    pub fn lock(&self) -> ReentrantGuard<'_, T> {
        let this_thread = std::thread::current().id();
        loop {
            let mut owner = self.owner.lock().unwrap();
            match owner.thread {
                Some(t) if t == this_thread => {
                    owner.depth += 1;
                    return ReentrantGuard { mutex: self };
                }
                None => {
                    owner.thread = Some(this_thread);
                    owner.depth = 1;
                    return ReentrantGuard { mutex: self };
                }
                Some(_) => {
                    // Someone else holds it: drop our lock on `owner` and
                    // spin. The port lock is only ever held briefly (one
                    // state-machine call), so a short-lived spin beats
                    // the complexity of a condvar-based handoff here.
                    drop(owner);
                    std::thread::yield_now();
                }
            }
        }
    }
}

pub struct ReentrantGuard<'a, T> {
    mutex: &'a ReentrantMutex<T>,
}

impl<T> core::ops::Deref for ReentrantGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: this thread holds the lock (recorded in `owner`) for the
        // lifetime of the guard.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> core::ops::DerefMut for ReentrantGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `Deref`; exclusive access is guaranteed by `owner`
        // only ever recording one thread id at a time.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for ReentrantGuard<'_, T> {
    fn drop(&mut self) {
        let mut owner: MutexGuard<'_, Owner> = self.mutex.owner.lock().unwrap();
        owner.depth -= 1;
        if owner.depth == 0 {
            owner.thread = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentrant_lock_nests_on_same_thread() {
        let mutex = ReentrantMutex::new(0u32);
        let mut outer = mutex.lock();
        *outer += 1;
        {
            let mut inner = mutex.lock();
            *inner += 1;
        }
        assert_eq!(*outer, 2);
    }

    #[test]
    fn blocks_across_threads() {
        use std::sync::Arc;

        let mutex = Arc::new(ReentrantMutex::new(0u32));
        let guard = mutex.lock();
        let other = Arc::clone(&mutex);
        let handle = std::thread::spawn(move || {
            let mut g = other.lock();
            *g += 1;
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        drop(guard);
        handle.join().unwrap();
        assert_eq!(*mutex.lock(), 1);
    }
}
