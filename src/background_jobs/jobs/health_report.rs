use super::{load_settings, record_run, send_text_to_admins, SettingsSlot};
use crate::background_jobs::context::JobContext;
use crate::background_jobs::job::{evaluate, Decision, JobError, JobOutcome, ScheduledJob};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::info;

/// Daily status and audit summary for the admins.
pub struct HealthReportJob;

#[async_trait]
impl ScheduledJob for HealthReportJob {
    fn id(&self) -> &'static str {
        "health_report"
    }

    fn description(&self) -> &'static str {
        "Send the runtime status and content audit to the admins daily"
    }

    async fn tick(&self, now: DateTime<Local>, ctx: &JobContext) -> Result<JobOutcome, JobError> {
        let settings = load_settings(ctx)?;
        if let Decision::Skip(reason) = evaluate(&SettingsSlot::Health.window(&settings), &now) {
            return Ok(JobOutcome::Skipped(reason));
        }

        let status = ctx.status.status_text().map_err(JobError::Persistence)?;
        let audit = ctx.reports.audit_report().map_err(JobError::Persistence)?;

        let delivered = send_text_to_admins(ctx, self.id(), &status).await;
        send_text_to_admins(ctx, self.id(), &audit).await;

        info!("Health report sent to {} admin(s)", delivered);
        record_run(ctx, self.id(), SettingsSlot::Health, now);
        Ok(JobOutcome::Ran)
    }
}
