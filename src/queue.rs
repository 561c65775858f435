//! Fixed-capacity lock-free MPMC task container.
//!
//! A sequence-stamped ring: each slot carries an atomic stamp that encodes
//! whether it is free for the next producer or holds a value for the next
//! consumer. `try_push` fails immediately once capacity is exhausted and
//! `pop` returns `None` immediately on empty; neither ever blocks or spins
//! unboundedly. The Release store of a slot's stamp after writing the value,
//! paired with the consumer's Acquire load, is what makes the payload visible
//! to the thread that executes it.
//!
//! Ordering across elements is unspecified; the only guarantee is that every
//! successfully pushed element is handed to exactly one successful pop.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::padded::CachePadded;

struct Slot<T> {
    stamp: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

unsafe impl<T: Send> Send for Slot<T> {}
unsafe impl<T: Send> Sync for Slot<T> {}

pub struct BoundedQueue<T> {
    buffer: Box<[Slot<T>]>,
    mask: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at least `capacity` elements. The capacity is
    /// rounded up to the next power of two and is a hard ceiling for the
    /// queue's lifetime.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        let capacity = capacity.next_power_of_two();

        let buffer: Box<[Slot<T>]> = (0..capacity)
            .map(|i| Slot {
                stamp: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        BoundedQueue {
            buffer,
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Push without blocking. Returns the element back if the queue is full.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut tail = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.buffer[tail & self.mask];
            let stamp = slot.stamp.load(Ordering::Acquire);

            if stamp == tail {
                // slot is free for this ticket, claim it
                match self.tail.compare_exchange_weak(
                    tail,
                    tail.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe { (*slot.value.get()).write(value) };
                        slot.stamp.store(tail.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => tail = current,
                }
            } else if (stamp.wrapping_sub(tail) as isize) < 0 {
                // stamp lags the ticket by a full lap: the consumer side has
                // not freed this slot yet, the queue is full
                return Err(value);
            } else {
                // another producer claimed this ticket, reload
                tail = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Pop without blocking. Returns `None` immediately when empty.
    pub fn pop(&self) -> Option<T> {
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.buffer[head & self.mask];
            let stamp = slot.stamp.load(Ordering::Acquire);
            let expected = head.wrapping_add(1);

            if stamp == expected {
                match self.head.compare_exchange_weak(
                    head,
                    head.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        // free the slot for the producer one lap ahead
                        slot.stamp
                            .store(head.wrapping_add(self.buffer.len()), Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => head = current,
                }
            } else if (stamp.wrapping_sub(expected) as isize) < 0 {
                return None;
            } else {
                head = self.head.load(Ordering::Relaxed);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail == head
    }
}

impl<T> Drop for BoundedQueue<T> {
    fn drop(&mut self) {
        // release any elements still in flight
        while self.pop().is_some() {}
    }
}
