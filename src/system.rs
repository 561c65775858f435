use std::num::NonZeroUsize;
use std::thread;

/// Host facts detected once at startup and read-only afterwards.
///
/// Callers sizing a pool query this by value instead of reaching for an
/// ambient global; detection itself happens exactly where the value is
/// constructed.
#[derive(Debug, Clone, Copy)]
pub struct SystemInfo {
    num_processors: usize,
}

impl SystemInfo {
    /// Detect the number of processors available to this process. Never
    /// reports fewer than one.
    pub fn detect() -> Self {
        let num_processors = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        SystemInfo { num_processors }
    }

    pub fn num_processors(&self) -> usize {
        self.num_processors
    }
}
