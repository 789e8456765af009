//! Weekly theme post: a header naming the theme, then a few items of it.

use super::{load_settings, record_run, SettingsSlot};
use crate::background_jobs::context::JobContext;
use crate::background_jobs::job::{evaluate, Decision, JobError, JobOutcome, ScheduledJob, SkipReason};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::{info, warn};

pub struct WeeklyThemeJob;

#[async_trait]
impl ScheduledJob for WeeklyThemeJob {
    fn id(&self) -> &'static str {
        "weekly_theme"
    }

    fn description(&self) -> &'static str {
        "Announce the theme of the week and post items of it"
    }

    async fn tick(&self, now: DateTime<Local>, ctx: &JobContext) -> Result<JobOutcome, JobError> {
        let settings = load_settings(ctx)?;
        if let Decision::Skip(reason) = evaluate(&SettingsSlot::Theme.window(&settings), &now) {
            return Ok(JobOutcome::Skipped(reason));
        }

        let Some(theme) = ctx.themes.pick(now) else {
            warn!("Weekly theme: no theme available");
            return Ok(JobOutcome::Skipped(SkipReason::NothingToSend));
        };

        let channel = ctx.channel_id;
        let notifier = ctx.notifier.clone();
        let header = format!("Theme of the week: {}", theme);
        ctx.options
            .retry
            .run(|| {
                let notifier = notifier.clone();
                let header = header.as_str();
                async move { notifier.send_text(channel, header).await }
            })
            .await
            .map_err(JobError::Delivery)?;

        let items = ctx
            .content
            .random_items_by_category(&theme, ctx.options.theme_items);
        let mut sent = 0;
        for (i, item) in items.iter().enumerate() {
            if ctx.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            if i > 0 {
                tokio::time::sleep(ctx.options.theme_item_pause).await;
            }
            let result = ctx
                .options
                .retry
                .run(|| {
                    let notifier = notifier.clone();
                    async move { notifier.send_item(channel, item).await }
                })
                .await;
            match result {
                Ok(()) => sent += 1,
                Err(e) => warn!("Weekly theme: item {} failed: {}", item.id, e),
            }
        }

        info!(
            "Weekly theme: posted {:?} with {}/{} item(s)",
            theme,
            sent,
            items.len()
        );
        record_run(ctx, self.id(), SettingsSlot::Theme, now);
        Ok(JobOutcome::Ran)
    }
}
