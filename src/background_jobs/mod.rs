//! Minute-granularity job scheduling.
//!
//! The scheduler wakes up once a minute and asks each registered job, in a
//! fixed order, whether it is due. Due-ness compares calendar days in local
//! time, so every job fires at most once per day.

mod context;
mod job;
pub mod jobs;
mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{JobContext, JobOptions};
pub use job::{
    describe_last_run, evaluate, is_same_day, parse_time, Decision, JobError, JobOutcome,
    JobWindow, ScheduledJob, SkipReason,
};
pub use scheduler::{JobScheduler, TickResult, DEFAULT_TICK_INTERVAL};
