//! Persistence of job settings, run history and subscriptions.

mod models;
mod schema;
mod sqlite_schedule_store;

pub use models::*;
pub use schema::SCHEDULE_VERSIONED_SCHEMAS;
pub use sqlite_schedule_store::SqliteScheduleStore;

use anyhow::Result;
use std::path::PathBuf;

pub trait SettingsStore: Send + Sync {
    fn get(&self) -> Result<ScheduleSettings>;
    fn save(&self, settings: &ScheduleSettings) -> Result<()>;
}

pub trait SubscriptionStore: Send + Sync {
    fn list_active(&self) -> Result<Vec<Subscription>>;
    fn save(&self, subscription: &Subscription) -> Result<()>;
}

/// Produces the file sent by the weekly backup.
pub trait BackupSource: Send + Sync {
    /// Compact the database if possible and return the path of the file to
    /// ship.
    fn prepare_backup(&self) -> Result<PathBuf>;
}
