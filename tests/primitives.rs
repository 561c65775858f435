use std::cell::UnsafeCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use stack_pool::{BoundedQueue, Mutex, Semaphore, SpinLock, TIMEOUT_INFINITE};

// a counter guarded only by the lock under test
struct Guarded<L> {
    lock: L,
    value: UnsafeCell<u64>,
}

unsafe impl<L: Sync> Sync for Guarded<L> {}

#[test]
fn spinlock_provides_mutual_exclusion() {
    const THREADS: usize = 4;
    const INCREMENTS: u64 = 10_000;

    let guarded = Guarded {
        lock: SpinLock::new(),
        value: UnsafeCell::new(0),
    };

    // capture the whole struct reference so the Sync impl applies, rather
    // than letting the closure borrow the UnsafeCell field on its own
    let guarded = &guarded;
    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(move || {
                for _ in 0..INCREMENTS {
                    guarded.lock.lock();
                    unsafe { *guarded.value.get() += 1 };
                    guarded.lock.unlock();
                }
            });
        }
    });

    assert_eq!(unsafe { *guarded.value.get() }, THREADS as u64 * INCREMENTS);
}

#[test]
fn mutex_provides_mutual_exclusion() {
    const THREADS: usize = 4;
    const INCREMENTS: u64 = 10_000;

    let guarded = Guarded {
        lock: Mutex::new(),
        value: UnsafeCell::new(0),
    };

    let guarded = &guarded;
    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(move || {
                for _ in 0..INCREMENTS {
                    guarded.lock.lock();
                    unsafe { *guarded.value.get() += 1 };
                    guarded.lock.unlock();
                }
            });
        }
    });

    assert_eq!(unsafe { *guarded.value.get() }, THREADS as u64 * INCREMENTS);
}

#[test]
fn mutex_diagnostics_catch_unmatched_unlock() {
    let mutex = Mutex::with_diagnostics(true);
    let result = catch_unwind(AssertUnwindSafe(|| mutex.unlock()));
    assert!(result.is_err());
}

#[test]
fn mutex_diagnostics_off_skips_depth_tracking() {
    // both code paths are reachable in one build: with diagnostics off the
    // same lock/unlock sequence carries no depth accounting
    let mutex = Mutex::with_diagnostics(false);
    mutex.lock();
    mutex.unlock();
    mutex.set_spin_count(4000); // advisory, may be ignored
}

#[test]
fn semaphore_wait_times_out_after_requested_delay() {
    let sem = Semaphore::new(0, 1);

    let start = Instant::now();
    assert!(!sem.wait(50));
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn semaphore_wait_satisfied_by_concurrent_release() {
    let sem = Arc::new(Semaphore::new(0, 16));

    let releaser = {
        let sem = Arc::clone(&sem);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sem.release(1);
        })
    };

    let start = Instant::now();
    assert!(sem.wait(5_000));
    assert!(start.elapsed() < Duration::from_secs(5));
    releaser.join().unwrap();
}

#[test]
fn semaphore_release_many_wakes_many() {
    let sem = Arc::new(Semaphore::new(0, 16));
    let woken = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let sem = Arc::clone(&sem);
            let woken = Arc::clone(&woken);
            thread::spawn(move || {
                assert!(sem.wait(TIMEOUT_INFINITE));
                woken.fetch_add(1, Ordering::Relaxed);
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    sem.release(4);

    for waiter in waiters {
        waiter.join().unwrap();
    }
    assert_eq!(woken.load(Ordering::Relaxed), 4);
}

#[test]
fn semaphore_release_clamps_at_max_count() {
    let sem = Semaphore::new(0, 2);

    // releasing past the ceiling is not fatal: the count clamps there and
    // exactly max_count counts are consumable
    sem.release(5);

    assert!(sem.wait(0));
    assert!(sem.wait(0));
    assert!(!sem.wait(0));
}

#[test]
fn semaphore_try_release_saturates_at_max_count() {
    let sem = Semaphore::new(0, 2);

    // the hint path: counts beyond the ceiling collapse silently
    sem.try_release(5);

    assert!(sem.wait(0));
    assert!(sem.wait(0));
    assert!(!sem.wait(0));
}

#[test]
fn semaphore_initial_count_is_consumable() {
    let sem = Semaphore::new(3, 8);
    assert!(sem.wait(0));
    assert!(sem.wait(0));
    assert!(sem.wait(0));
    assert!(!sem.wait(0));
}

#[test]
fn queue_fails_fast_when_full_and_empty() {
    let queue: BoundedQueue<u64> = BoundedQueue::with_capacity(4);
    assert_eq!(queue.capacity(), 4);
    assert!(queue.is_empty());
    assert_eq!(queue.pop(), None);

    for i in 0..4 {
        assert!(queue.try_push(i).is_ok());
    }
    // full: the element comes straight back, nothing blocks or evicts
    assert_eq!(queue.try_push(99), Err(99));

    let mut popped: Vec<u64> = std::iter::from_fn(|| queue.pop()).collect();
    popped.sort_unstable();
    assert_eq!(popped, [0, 1, 2, 3]);
    assert_eq!(queue.pop(), None);

    // slots recycle once drained
    assert!(queue.try_push(5).is_ok());
    assert_eq!(queue.pop(), Some(5));
}

#[test]
fn queue_capacity_rounds_up_to_power_of_two() {
    let queue: BoundedQueue<u8> = BoundedQueue::with_capacity(5);
    assert_eq!(queue.capacity(), 8);
}

#[test]
fn queue_mpmc_each_item_popped_exactly_once() {
    const PRODUCERS: u64 = 4;
    const CONSUMERS: usize = 2;
    const PER_PRODUCER: u64 = 10_000;
    const TOTAL: u64 = PRODUCERS * PER_PRODUCER;

    let queue: BoundedQueue<u64> = BoundedQueue::with_capacity(1024);
    let popped_count = AtomicU64::new(0);
    let popped_sum = AtomicU64::new(0);

    thread::scope(|scope| {
        for p in 0..PRODUCERS {
            let queue = &queue;
            scope.spawn(move || {
                for i in 0..PER_PRODUCER {
                    let mut value = p * PER_PRODUCER + i + 1;
                    // bounded queue: spin until a consumer frees a slot
                    while let Err(v) = queue.try_push(value) {
                        value = v;
                        thread::yield_now();
                    }
                }
            });
        }

        for _ in 0..CONSUMERS {
            let queue = &queue;
            let popped_count = &popped_count;
            let popped_sum = &popped_sum;
            scope.spawn(move || {
                while popped_count.load(Ordering::Relaxed) < TOTAL {
                    match queue.pop() {
                        Some(value) => {
                            popped_sum.fetch_add(value, Ordering::Relaxed);
                            popped_count.fetch_add(1, Ordering::Relaxed);
                        }
                        None => thread::yield_now(),
                    }
                }
            });
        }
    });

    assert_eq!(popped_count.load(Ordering::Relaxed), TOTAL);
    // sum of 1..=TOTAL: catches both lost and double-delivered items
    assert_eq!(popped_sum.load(Ordering::Relaxed), TOTAL * (TOTAL + 1) / 2);
}
