//! Short-critical-section spin lock.
//!
//! Delegates to the native spin primitive where the platform has one
//! (pthread spinlocks on Linux, the unfair lock on Apple targets) and falls
//! back to a compare-and-swap loop everywhere else. Same `lock`/`unlock`
//! contract in every case: callers busy-wait, so the lock must never be held
//! across anything that blocks or takes non-trivial time.

#[cfg(target_os = "linux")]
mod imp {
    use std::cell::UnsafeCell;

    use crate::fault::fatal;

    pub struct RawSpinLock {
        lock: UnsafeCell<libc::pthread_spinlock_t>,
    }

    impl RawSpinLock {
        pub fn new() -> Self {
            let this = RawSpinLock {
                lock: UnsafeCell::new(0),
            };
            if unsafe { libc::pthread_spin_init(this.lock.get(), libc::PTHREAD_PROCESS_PRIVATE) }
                != 0
            {
                fatal("spinlock: pthread_spin_init() failed");
            }
            this
        }

        #[inline]
        pub fn lock(&self) {
            if unsafe { libc::pthread_spin_lock(self.lock.get()) } != 0 {
                fatal("spinlock: pthread_spin_lock() failed");
            }
        }

        #[inline]
        pub fn unlock(&self) {
            if unsafe { libc::pthread_spin_unlock(self.lock.get()) } != 0 {
                fatal("spinlock: pthread_spin_unlock() failed");
            }
        }
    }

    impl Drop for RawSpinLock {
        fn drop(&mut self) {
            if unsafe { libc::pthread_spin_destroy(self.lock.get()) } != 0 {
                fatal("spinlock: pthread_spin_destroy() failed");
            }
        }
    }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod imp {
    use std::cell::UnsafeCell;
    use std::mem;

    // OS_UNFAIR_LOCK_INIT is all-zero, so a zeroed struct is a valid lock.
    pub struct RawSpinLock {
        lock: UnsafeCell<libc::os_unfair_lock_s>,
    }

    impl RawSpinLock {
        pub fn new() -> Self {
            RawSpinLock {
                lock: UnsafeCell::new(unsafe { mem::zeroed() }),
            }
        }

        #[inline]
        pub fn lock(&self) {
            unsafe { libc::os_unfair_lock_lock(self.lock.get()) }
        }

        #[inline]
        pub fn unlock(&self) {
            unsafe { libc::os_unfair_lock_unlock(self.lock.get()) }
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios")))]
mod imp {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    // bounded spin before giving the core away once, then spin again
    const SPIN_ATTEMPTS: u32 = 10_000;

    pub struct RawSpinLock {
        state: AtomicU32,
    }

    impl RawSpinLock {
        pub fn new() -> Self {
            RawSpinLock {
                state: AtomicU32::new(0),
            }
        }

        #[inline]
        pub fn lock(&self) {
            loop {
                for _ in 0..SPIN_ATTEMPTS {
                    if self
                        .state
                        .compare_exchange_weak(0, 1, Ordering::Acquire, Ordering::Relaxed)
                        .is_ok()
                    {
                        return;
                    }
                    std::hint::spin_loop();
                }
                thread::yield_now();
            }
        }

        #[inline]
        pub fn unlock(&self) {
            self.state.store(0, Ordering::Release);
        }
    }
}

/// Mutual exclusion by busy-waiting, intended for extremely short critical
/// sections. No queuing and no fairness guarantee.
pub struct SpinLock {
    raw: imp::RawSpinLock,
}

unsafe impl Send for SpinLock {}
unsafe impl Sync for SpinLock {}

impl SpinLock {
    pub fn new() -> Self {
        SpinLock {
            raw: imp::RawSpinLock::new(),
        }
    }

    /// Acquire the lock, spinning until it is free.
    #[inline]
    pub fn lock(&self) {
        self.raw.lock();
    }

    /// Release the lock. Caller must hold it.
    #[inline]
    pub fn unlock(&self) {
        self.raw.unlock();
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        SpinLock::new()
    }
}
