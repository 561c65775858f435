// Stack-Pool: fixed-capacity worker-thread pool on OS threading primitives
// A bounded task pool and the synchronization layer it is built from:
// - Single shared lock-free bounded queue, fail-fast on full (backpressure)
// - Counting semaphore as the worker wake signal
// - Saturating max-1 semaphore as the join completion hint
// - join() drains inline, so zero-worker pools still make progress
// - Spinlock and blocking mutex primitives for the code built on top
//
// Safety
// Task submission passes raw context pointers for zero-overhead dispatch.
// You must ensure:
// - Context structs live until join() (or deinit()) returns
// - Result pointers remain valid until task completion
// - No data races inside your task bodies
mod fault;
mod macros;
mod mutex;
mod padded;
mod pool;
mod queue;
mod semaphore;
mod spinlock;
mod system;

pub use mutex::Mutex;
pub use pool::{DEFAULT_QUEUE_CAPACITY, ExecutableTask, MAX_WORKERS, TaskPool};
pub use queue::BoundedQueue;
pub use semaphore::{Semaphore, TIMEOUT_INFINITE};
pub use spinlock::SpinLock;
pub use system::SystemInfo;

// task callback signature: opaque 64-bit word plus raw context pointer,
// both passed through uninterpreted
pub type TaskCallback = fn(data: u64, context: TaskContextPointer);

// pointer to caller-owned task context
pub type TaskContextPointer = *mut ();

// convenience constructor: one worker per detected processor
pub fn new() -> TaskPool {
    with_workers(SystemInfo::detect().num_processors())
}

// create a running pool with a specific worker count
pub fn with_workers(worker_count: usize) -> TaskPool {
    let mut pool = TaskPool::new();
    assert!(pool.init(worker_count), "worker thread spawn failed");
    pool
}
