//! Counting semaphore with timed waits.
//!
//! Built on a mutex/condvar pair rather than `sem_t` so the maximum count is
//! enforced portably. The count never exceeds the ceiling fixed at
//! construction: a release that would overflow it clamps there, which is what
//! lets a max-1 semaphore act as a coalescing completion signal —
//! [`Semaphore::try_release`] exists for exactly that level-triggered use,
//! where the real state lives in counters elsewhere and collapsed wakeups are
//! fine.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Timeout value that blocks [`Semaphore::wait`] indefinitely.
pub const TIMEOUT_INFINITE: u32 = u32::MAX;

pub struct Semaphore {
    count: Mutex<u32>,
    cv: Condvar,
    max_count: u32,
}

impl Semaphore {
    /// Create a semaphore with `initial` counts available and a hard ceiling
    /// of `max_count`.
    pub fn new(initial: u32, max_count: u32) -> Self {
        assert!(initial <= max_count);
        Semaphore {
            count: Mutex::new(initial),
            cv: Condvar::new(),
            max_count,
        }
    }

    /// Add `n` counts, up to the ceiling, and wake up to `n` waiters.
    pub fn release(&self, n: u32) {
        debug_assert!(n >= 1);
        let mut count = self.count.lock().unwrap();
        *count = count.saturating_add(n).min(self.max_count);
        drop(count);
        self.notify(n);
    }

    /// Best-effort release for level-triggered signals: counts beyond the
    /// ceiling are discarded silently, by design — waiters are expected to
    /// treat a wake as "re-check the real state", not as a counted event.
    pub fn try_release(&self, n: u32) {
        self.release(n);
    }

    /// Block until a count is available (returns `true`, consuming it) or
    /// `milliseconds` elapse (returns `false`). [`TIMEOUT_INFINITE`] never
    /// expires.
    pub fn wait(&self, milliseconds: u32) -> bool {
        let mut count = self.count.lock().unwrap();

        if milliseconds == TIMEOUT_INFINITE {
            while *count == 0 {
                count = self.cv.wait(count).unwrap();
            }
        } else {
            // track an absolute deadline so spurious wakeups don't extend it
            let deadline = Instant::now() + Duration::from_millis(u64::from(milliseconds));
            while *count == 0 {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                let (guard, _timeout) = self.cv.wait_timeout(count, deadline - now).unwrap();
                count = guard;
            }
        }

        *count -= 1;
        true
    }

    fn notify(&self, n: u32) {
        if n == 1 {
            self.cv.notify_one();
        } else {
            self.cv.notify_all();
        }
    }
}
