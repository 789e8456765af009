use super::{load_settings, record_run, send_text_to_admins, SettingsSlot};
use crate::background_jobs::context::JobContext;
use crate::background_jobs::job::{evaluate, Decision, JobError, JobOutcome, ScheduledJob};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::info;

/// Weekly summary report for the admins.
pub struct WeeklyReportJob;

#[async_trait]
impl ScheduledJob for WeeklyReportJob {
    fn id(&self) -> &'static str {
        "weekly_report"
    }

    fn description(&self) -> &'static str {
        "Send the weekly summary report to the admins"
    }

    async fn tick(&self, now: DateTime<Local>, ctx: &JobContext) -> Result<JobOutcome, JobError> {
        let settings = load_settings(ctx)?;
        if let Decision::Skip(reason) = evaluate(&SettingsSlot::Report.window(&settings), &now) {
            return Ok(JobOutcome::Skipped(reason));
        }

        let report = ctx.reports.weekly_report().map_err(JobError::Persistence)?;
        let delivered = send_text_to_admins(ctx, self.id(), &report).await;

        info!("Weekly report sent to {} admin(s)", delivered);
        record_run(ctx, self.id(), SettingsSlot::Report, now);
        Ok(JobOutcome::Ran)
    }
}
