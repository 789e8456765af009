//! Ophelia daemon library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod background_jobs;
pub mod config;
pub mod content;
pub mod housekeeping;
pub mod logging;
pub mod notifications;
pub mod reports;
pub mod schedule_store;
pub mod sqlite_persistence;
pub mod tasks;

// Re-export commonly used types for convenience
pub use background_jobs::{JobContext, JobScheduler, ScheduledJob};
pub use housekeeping::{Housekeeper, RuntimeWatchdog, UserRateLimiter};
pub use schedule_store::{SettingsStore, SqliteScheduleStore, SubscriptionStore};
pub use tasks::{HeavyTaskLimiter, RetryPolicy};
