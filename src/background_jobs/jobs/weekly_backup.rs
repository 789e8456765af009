//! Weekly database backup, sent to every admin.

use crate::background_jobs::context::JobContext;
use crate::background_jobs::job::{evaluate, Decision, JobError, JobOutcome, JobWindow, ScheduledJob};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::sync::Mutex;
use tracing::{info, warn};

/// Sunday.
const BACKUP_WEEKDAY: u32 = 0;
const BACKUP_TIME: &str = "03:00";

/// Fires on Sunday at 03:00. The schedule is fixed; the last run is kept in
/// memory only, so a restart inside the backup minute may send it again.
pub struct WeeklyBackupJob {
    last_run: Mutex<Option<DateTime<Local>>>,
}

impl WeeklyBackupJob {
    pub fn new() -> Self {
        Self {
            last_run: Mutex::new(None),
        }
    }

    fn last_run(&self) -> Option<DateTime<Local>> {
        *self.last_run.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_last_run(&self, now: DateTime<Local>) {
        *self.last_run.lock().unwrap_or_else(|e| e.into_inner()) = Some(now);
    }
}

impl Default for WeeklyBackupJob {
    fn default() -> Self {
        Self::new()
    }
}

/// Prepare the backup file and send it to every admin.
///
/// Returns the number of admins that received it.
pub async fn deliver_backup(ctx: &JobContext, now: DateTime<Local>) -> Result<usize, JobError> {
    let admins = ctx.recipients.admin_ids();
    if admins.is_empty() {
        warn!("Backup: no admins configured, nothing sent");
        return Ok(0);
    }

    let path = ctx
        .backup_source
        .prepare_backup()
        .map_err(JobError::Persistence)?;
    let caption = format!("Weekly database backup {}", now.format("%d.%m.%Y %H:%M"));

    let mut delivered = 0;
    for admin in admins {
        let notifier = ctx.notifier.clone();
        let result = ctx
            .options
            .retry
            .run(|| {
                let notifier = notifier.clone();
                let path = path.as_path();
                let caption = caption.as_str();
                async move { notifier.send_file(admin, path, caption).await }
            })
            .await;
        match result {
            Ok(()) => delivered += 1,
            Err(e) => warn!("Backup: failed to send to admin {}: {}", admin, e),
        }
    }
    info!("Backup: {:?} sent to {} admin(s)", path, delivered);
    Ok(delivered)
}

#[async_trait]
impl ScheduledJob for WeeklyBackupJob {
    fn id(&self) -> &'static str {
        "weekly_backup"
    }

    fn description(&self) -> &'static str {
        "Send the database file to the admins every Sunday at 03:00"
    }

    async fn tick(&self, now: DateTime<Local>, ctx: &JobContext) -> Result<JobOutcome, JobError> {
        let last_run = self.last_run();
        let window = JobWindow::weekly(true, BACKUP_WEEKDAY, BACKUP_TIME, last_run.as_ref());
        if let Decision::Skip(reason) = evaluate(&window, &now) {
            return Ok(JobOutcome::Skipped(reason));
        }

        // Marked before sending so a slow or failing delivery is not repeated
        // within the same minute
        self.set_last_run(now);
        deliver_backup(ctx, now).await?;
        Ok(JobOutcome::Ran)
    }
}
