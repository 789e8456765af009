//! The scheduled jobs, in the order the scheduler checks them.

mod daily_post;
mod health_report;
mod subscriptions;
mod weekly_backup;
mod weekly_report;
mod weekly_theme;

pub use daily_post::DailyPostJob;
pub use health_report::HealthReportJob;
pub use subscriptions::{SubscriptionsJob, SUBSCRIPTION_HEADER};
pub use weekly_backup::{deliver_backup, WeeklyBackupJob};
pub use weekly_report::WeeklyReportJob;
pub use weekly_theme::WeeklyThemeJob;

use super::context::JobContext;
use super::job::{JobError, JobWindow, ScheduledJob};
use crate::schedule_store::ScheduleSettings;
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::warn;

/// The six jobs in their fixed evaluation order.
pub fn default_jobs() -> Vec<Arc<dyn ScheduledJob>> {
    vec![
        Arc::new(DailyPostJob),
        Arc::new(WeeklyBackupJob::new()),
        Arc::new(SubscriptionsJob),
        Arc::new(WeeklyThemeJob),
        Arc::new(HealthReportJob),
        Arc::new(WeeklyReportJob),
    ]
}

/// Which column group of [`ScheduleSettings`] a job owns.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SettingsSlot {
    DailyPost,
    Theme,
    Health,
    Report,
}

impl SettingsSlot {
    pub(crate) fn window(self, settings: &ScheduleSettings) -> JobWindow<'_> {
        match self {
            SettingsSlot::DailyPost => JobWindow::daily(
                settings.daily_post.active,
                &settings.daily_post.time,
                settings.daily_post.last_run.as_ref(),
            ),
            SettingsSlot::Theme => JobWindow::weekly(
                settings.theme.active,
                settings.theme.weekday,
                &settings.theme.time,
                settings.theme.last_run.as_ref(),
            ),
            SettingsSlot::Health => JobWindow::daily(
                settings.health.active,
                &settings.health.time,
                settings.health.last_run.as_ref(),
            ),
            SettingsSlot::Report => JobWindow::weekly(
                settings.report.active,
                settings.report.weekday,
                &settings.report.time,
                settings.report.last_run.as_ref(),
            ),
        }
    }

    fn set_last_run(self, settings: &mut ScheduleSettings, now: DateTime<Local>) {
        let slot = match self {
            SettingsSlot::DailyPost => &mut settings.daily_post.last_run,
            SettingsSlot::Theme => &mut settings.theme.last_run,
            SettingsSlot::Health => &mut settings.health.last_run,
            SettingsSlot::Report => &mut settings.report.last_run,
        };
        *slot = Some(now);
    }
}

pub(crate) fn load_settings(ctx: &JobContext) -> Result<ScheduleSettings, JobError> {
    ctx.settings_store.get().map_err(JobError::Persistence)
}

/// Record a completed run. A failed save is logged and otherwise ignored.
pub(crate) fn record_run(ctx: &JobContext, job_id: &str, slot: SettingsSlot, now: DateTime<Local>) {
    let result = ctx.settings_store.get().and_then(|mut settings| {
        slot.set_last_run(&mut settings, now);
        ctx.settings_store.save(&settings)
    });
    if let Err(e) = result {
        warn!("Job {}: failed to persist last run: {}", job_id, e);
    }
}

/// Send `text` to every admin with retry. Returns how many deliveries
/// succeeded.
pub(crate) async fn send_text_to_admins(ctx: &JobContext, job_id: &str, text: &str) -> usize {
    let admins = ctx.recipients.admin_ids();
    if admins.is_empty() {
        warn!("Job {}: no admins configured", job_id);
        return 0;
    }
    let mut delivered = 0;
    for admin in admins {
        let notifier = ctx.notifier.clone();
        let result = ctx
            .options
            .retry
            .run(|| {
                let notifier = notifier.clone();
                async move { notifier.send_text(admin, text).await }
            })
            .await;
        match result {
            Ok(()) => delivered += 1,
            Err(e) => warn!("Job {}: failed to send to admin {}: {}", job_id, admin, e),
        }
    }
    delivered
}
