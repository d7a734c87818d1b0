//! Module `parallel` supply the worker pool and budget arithmetic used
//! by the parallel tree walks.
//!
//! Parallel operations are pure fork/join over immutable structure.
//! Work is handed to a process-wide pool of `PAR_MULT *
//! virtual-processors - 1` workers, the multiplier compensates for
//! walks that are short and partly memory bound. Every operation takes
//! a recursion budget equal to the worker count and halves it at each
//! split point, once the budget is exhausted the walk degrades to a
//! sequential recursion.

use lazy_static::lazy_static;

/// Minimum `2^black-height` for a tree walk to be dispatched on the
/// worker pool, below this the sequential walk wins.
pub const PAR_THRESHOLD: usize = 1024;

/// Worker budget multiplier over the virtual-processor count.
pub const PAR_MULT: usize = 4;

lazy_static! {
    static ref POOL: rayon::ThreadPool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_budget())
        .thread_name(|n| format!("permap-worker-{}", n))
        .build()
        .expect("cannot build fork-join worker pool");
}

/// Compute the fork/join worker budget, `PAR_MULT * virtual-processors
/// - 1`. Read afresh for every parallel call.
pub(crate) fn worker_budget() -> usize {
    std::cmp::max(PAR_MULT * num_cpus::get(), 2) - 1
}

/// True when a tree of `black_height` is large enough to pay for the
/// fork/join overhead, that is `2^black_height >= PAR_THRESHOLD`.
pub(crate) fn above_threshold(black_height: usize) -> bool {
    1_usize
        .checked_shl(black_height as u32)
        .map_or(true, |n| n >= PAR_THRESHOLD)
}

/// Run `job` inside the worker pool, blocking until it completes.
pub(crate) fn install<R, F>(job: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    POOL.install(job)
}
