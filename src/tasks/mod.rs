//! Execution primitives shared by the scheduler, housekeeping and admin
//! actions: retry with backoff, supervised (panic-safe) tasks, and the
//! heavy task limiter.

pub mod heavy;
pub mod retry;
pub mod supervised;

pub use heavy::{HeavyTaskLimiter, DEFAULT_HEAVY_CAPACITY};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use supervised::{
    install_panic_hook, run_supervised, spawn_blocking_supervised, spawn_supervised,
};
