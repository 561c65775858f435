//! Blocking mutual exclusion over the OS lock.
//!
//! Non-recursive, single-owner. A runtime diagnostic mode (on by default in
//! debug builds) tracks a lock depth and panics on unlock-without-lock or
//! drop-while-locked; with diagnostics off those checks cost one branch on a
//! flag that is never taken.

use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(unix)]
mod imp {
    use std::cell::UnsafeCell;
    use std::ptr;

    use crate::fault::fatal;

    // boxed so the pthread_mutex_t never moves while live
    pub struct RawMutex {
        lock: Box<UnsafeCell<libc::pthread_mutex_t>>,
    }

    impl RawMutex {
        pub fn new() -> Self {
            let lock = Box::new(UnsafeCell::new(unsafe { std::mem::zeroed() }));
            if unsafe { libc::pthread_mutex_init(lock.get(), ptr::null()) } != 0 {
                fatal("mutex: pthread_mutex_init() failed");
            }
            RawMutex { lock }
        }

        #[inline]
        pub fn lock(&self) {
            if unsafe { libc::pthread_mutex_lock(self.lock.get()) } != 0 {
                fatal("mutex: pthread_mutex_lock() failed");
            }
        }

        #[inline]
        pub fn unlock(&self) {
            if unsafe { libc::pthread_mutex_unlock(self.lock.get()) } != 0 {
                fatal("mutex: pthread_mutex_unlock() failed");
            }
        }

        pub fn destroy(&mut self) {
            if unsafe { libc::pthread_mutex_destroy(self.lock.get()) } != 0 {
                fatal("mutex: pthread_mutex_destroy() failed");
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::sync::{Condvar, Mutex};

    pub struct RawMutex {
        locked: Mutex<bool>,
        cv: Condvar,
    }

    impl RawMutex {
        pub fn new() -> Self {
            RawMutex {
                locked: Mutex::new(false),
                cv: Condvar::new(),
            }
        }

        pub fn lock(&self) {
            let mut locked = self.locked.lock().unwrap();
            while *locked {
                locked = self.cv.wait(locked).unwrap();
            }
            *locked = true;
        }

        pub fn unlock(&self) {
            *self.locked.lock().unwrap() = false;
            self.cv.notify_one();
        }

        pub fn destroy(&mut self) {}
    }
}

pub struct Mutex {
    raw: imp::RawMutex,
    lock_depth: AtomicU32,
    diagnostics: bool,
}

unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

impl Mutex {
    pub fn new() -> Self {
        Mutex::with_diagnostics(cfg!(debug_assertions))
    }

    /// Like [`Mutex::new`] but with misuse diagnostics explicitly on or off,
    /// so both paths are reachable in one build.
    pub fn with_diagnostics(diagnostics: bool) -> Self {
        Mutex {
            raw: imp::RawMutex::new(),
            lock_depth: AtomicU32::new(0),
            diagnostics,
        }
    }

    /// Block until exclusive access is acquired.
    pub fn lock(&self) {
        self.raw.lock();
        if self.diagnostics {
            self.lock_depth.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Release the lock. Caller must hold it; in diagnostic mode an unlock
    /// without a matching lock panics.
    pub fn unlock(&self) {
        if self.diagnostics {
            let depth = self.lock_depth.load(Ordering::Relaxed);
            assert!(depth > 0, "mutex: unlock without matching lock");
            self.lock_depth.store(depth - 1, Ordering::Relaxed);
        }
        self.raw.unlock();
    }

    /// Advisory spin-count hint. Ignored on platforms without the concept.
    pub fn set_spin_count(&self, _count: u32) {}
}

impl Default for Mutex {
    fn default() -> Self {
        Mutex::new()
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        if self.diagnostics {
            assert!(
                self.lock_depth.load(Ordering::Relaxed) == 0,
                "mutex: dropped while locked"
            );
        }
        self.raw.destroy();
    }
}
