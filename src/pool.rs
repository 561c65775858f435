//! The task pool: a fixed set of worker threads fed from one bounded queue.
//!
//! A successful submission pushes a task record and releases one count of the
//! availability semaphore; idle workers block on that semaphore and pop on
//! wake. Completion is tracked by a pair of atomic counters, with a
//! saturating max-1 semaphore as a coalesced "check the counters now" hint
//! for [`TaskPool::join`]. The counters are the source of truth throughout;
//! the semaphores only move threads between running and blocked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crate::padded::CachePadded;
use crate::queue::BoundedQueue;
use crate::semaphore::{Semaphore, TIMEOUT_INFINITE};
use crate::{TaskCallback, TaskContextPointer};

/// Hard ceiling on worker threads per pool; `init` clamps to this.
pub const MAX_WORKERS: usize = 16;

/// Queue slots for pools built with [`TaskPool::new`]. Kept below the
/// availability semaphore ceiling: even with the count saturated by stale
/// wakeups, every live task still has a wake count backing it.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16 * 1024;

const AVAILABLE_MAX_COUNT: u32 = 32_767;

/// A polymorphic unit of work.
///
/// `execute` consumes the box, so the object releases itself when it
/// finishes; the pool never owns it past the call.
pub trait ExecutableTask: Send {
    fn execute(self: Box<Self>, data: u64, context: TaskContextPointer);
}

enum TaskPayload {
    Callback(TaskCallback),
    Object(Box<dyn ExecutableTask>),
}

struct Task {
    payload: TaskPayload,
    data: u64,
    context: TaskContextPointer,
}

// the context pointer is opaque to the pool; the submitter guarantees
// whatever it points at is safe to touch from the executing thread
unsafe impl Send for Task {}

struct Shared {
    tasks: BoundedQueue<Task>,
    tasks_available: Semaphore,
    all_tasks_completed: Semaphore,
    total_submitted: CachePadded<AtomicU64>,
    total_completed: CachePadded<AtomicU64>,
    exit_flag: AtomicBool,
}

impl Shared {
    fn submit(&self, task: Task) -> bool {
        self.total_submitted.fetch_add(1, Ordering::AcqRel);

        if self.tasks.try_push(task).is_err() {
            // Queue full: the task is dropped, never executed. Balance the
            // counters anyway so join() still converges; the caller sees
            // false and owns the retry decision.
            self.total_completed.fetch_add(1, Ordering::AcqRel);
            return false;
        }

        self.tasks_available.release(1);
        true
    }

    fn execute(&self, task: Task) {
        match task.payload {
            TaskPayload::Callback(callback) => callback(task.data, task.context),
            TaskPayload::Object(object) => object.execute(task.data, task.context),
        }

        let completed = self.total_completed.fetch_add(1, Ordering::AcqRel) + 1;
        if completed == self.total_submitted.load(Ordering::Acquire) {
            // max count 1: saturation just means a wake is already pending
            self.all_tasks_completed.try_release(1);
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        if !shared.tasks_available.wait(TIMEOUT_INFINITE) {
            break;
        }

        if shared.exit_flag.load(Ordering::SeqCst) {
            break;
        }

        // a joining thread may have drained the queue between the signal
        // and this pop; going back to sleep is the right response
        if let Some(task) = shared.tasks.pop() {
            shared.execute(task);
        }
    }
}

/// Fixed-capacity worker-thread pool with a single shared bounded queue.
pub struct TaskPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskPool {
    /// An uninitialized pool (no workers) with the default queue capacity.
    pub fn new() -> Self {
        TaskPool::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// An uninitialized pool whose queue holds at least `capacity` tasks.
    /// The capacity is fixed for the pool's lifetime and must stay within
    /// the availability semaphore ceiling (after power-of-two rounding), or
    /// a saturated count could leave queued tasks with no wake backing them.
    pub fn with_queue_capacity(capacity: usize) -> Self {
        assert!(
            capacity.next_power_of_two() <= AVAILABLE_MAX_COUNT as usize,
            "queue capacity exceeds the availability semaphore ceiling"
        );
        TaskPool {
            shared: Arc::new(Shared {
                tasks: BoundedQueue::with_capacity(capacity),
                tasks_available: Semaphore::new(0, AVAILABLE_MAX_COUNT),
                all_tasks_completed: Semaphore::new(0, 1),
                total_submitted: CachePadded::new(AtomicU64::new(0)),
                total_completed: CachePadded::new(AtomicU64::new(0)),
                exit_flag: AtomicBool::new(false),
            }),
            workers: Vec::new(),
        }
    }

    /// Start `num_threads` workers (clamped to [`MAX_WORKERS`]), tearing down
    /// any previous configuration first. Returns `false` and rolls back to
    /// the uninitialized state if a worker thread fails to start.
    pub fn init(&mut self, num_threads: usize) -> bool {
        let num_threads = num_threads.min(MAX_WORKERS);

        self.deinit();

        tracing::debug!(target: "stack_pool", num_threads, "task pool starting");

        let mut succeeded = true;
        for id in 0..num_threads {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("sp{id}"))
                .spawn(move || worker_loop(shared));

            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(err) => {
                    tracing::warn!(target: "stack_pool", %err, "worker thread spawn failed");
                    succeeded = false;
                    break;
                }
            }
        }

        if !succeeded {
            self.deinit();
            return false;
        }

        true
    }

    /// Drain all outstanding work, stop every worker, and reset the pool to
    /// the uninitialized state. Safe to call on an uninitialized pool.
    pub fn deinit(&mut self) {
        if !self.workers.is_empty() {
            self.join();

            self.shared.exit_flag.store(true, Ordering::SeqCst);

            // one wake per worker: each wait consumes exactly one count, so
            // every blocked worker gets to observe the exit flag
            self.shared
                .tasks_available
                .release(self.workers.len() as u32);

            for handle in self.workers.drain(..) {
                let _ = handle.join();
            }

            self.shared.exit_flag.store(false, Ordering::SeqCst);
            tracing::debug!(target: "stack_pool", "task pool stopped");
        }

        while self.shared.tasks.pop().is_some() {}
        self.shared.total_submitted.store(0, Ordering::SeqCst);
        self.shared.total_completed.store(0, Ordering::SeqCst);
    }

    /// Submit a function-pointer task. `data` and `context` are passed
    /// through to the callback uninterpreted.
    ///
    /// Returns `false` if the queue is full: the task was dropped and will
    /// never run, and retrying is the caller's responsibility.
    pub fn queue_task(
        &self,
        callback: TaskCallback,
        data: u64,
        context: TaskContextPointer,
    ) -> bool {
        self.shared.submit(Task {
            payload: TaskPayload::Callback(callback),
            data,
            context,
        })
    }

    /// Submit an owned task object; its `execute` method consumes it. Same
    /// queue-full drop contract as [`TaskPool::queue_task`] — on `false` the
    /// object is dropped without running.
    pub fn queue_task_object(
        &self,
        object: Box<dyn ExecutableTask>,
        data: u64,
        context: TaskContextPointer,
    ) -> bool {
        self.shared.submit(Task {
            payload: TaskPayload::Object(object),
            data,
            context,
        })
    }

    /// Wait until every task submitted before this call has executed.
    ///
    /// The calling thread first drains the queue itself, so progress is
    /// guaranteed even with zero workers. Tasks submitted concurrently with
    /// or after the drain are not waited for.
    pub fn join(&self) {
        // Steal anything still queued. This can leave workers waking to an
        // empty queue, which is wasteful but harmless.
        while let Some(task) = self.shared.tasks.pop() {
            self.shared.execute(task);
        }

        // The completion semaphore has a max count of 1 and may have
        // saturated during an earlier completion burst, so its count cannot
        // be trusted as a vote. Poll the counters with a short bounded wait
        // until the snapshot is covered.
        let submitted = self.shared.total_submitted.load(Ordering::Acquire);
        while self.shared.total_completed.load(Ordering::Acquire) < submitted {
            self.shared.all_tasks_completed.wait(1);
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Whether every submitted task has been accounted for.
    pub fn is_idle(&self) -> bool {
        self.total_completed() == self.total_submitted()
    }

    /// Tasks submitted since the last `init`/`deinit`, including ones the
    /// queue rejected. Monotonic until reset by [`TaskPool::deinit`].
    pub fn total_submitted(&self) -> u64 {
        self.shared.total_submitted.load(Ordering::Acquire)
    }

    /// Tasks accounted as complete (executed or dropped at submission).
    pub fn total_completed(&self) -> u64 {
        self.shared.total_completed.load(Ordering::Acquire)
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        TaskPool::new()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.deinit();
    }
}
