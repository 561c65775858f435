use std::process;

// Called when a foundational OS primitive cannot be constructed or released.
// The process cannot make forward progress without its locks and semaphores,
// so this reports through the logging sink and aborts rather than unwinding.
#[cold]
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) fn fatal(what: &str) -> ! {
    tracing::error!(target: "stack_pool", "fatal: {what}");
    process::abort();
}
