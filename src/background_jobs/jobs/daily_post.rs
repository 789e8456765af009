//! Daily content post to the target channel.

use super::{load_settings, record_run, SettingsSlot};
use crate::background_jobs::context::JobContext;
use crate::background_jobs::job::{evaluate, Decision, JobError, JobOutcome, ScheduledJob, SkipReason};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::{info, warn};

pub struct DailyPostJob;

#[async_trait]
impl ScheduledJob for DailyPostJob {
    fn id(&self) -> &'static str {
        "daily_post"
    }

    fn description(&self) -> &'static str {
        "Post a random item to the channel once a day"
    }

    async fn tick(&self, now: DateTime<Local>, ctx: &JobContext) -> Result<JobOutcome, JobError> {
        let settings = load_settings(ctx)?;
        if let Decision::Skip(reason) = evaluate(&SettingsSlot::DailyPost.window(&settings), &now) {
            return Ok(JobOutcome::Skipped(reason));
        }

        let Some(item) = ctx.content.random_item() else {
            warn!("Daily post: catalog has no items");
            return Ok(JobOutcome::Skipped(SkipReason::NothingToSend));
        };

        let notifier = ctx.notifier.clone();
        let channel = ctx.channel_id;
        ctx.options
            .retry
            .run(|| {
                let notifier = notifier.clone();
                let item = &item;
                async move { notifier.send_item(channel, item).await }
            })
            .await
            .map_err(JobError::Delivery)?;

        info!("Daily post: sent item {} to channel {}", item.id, channel);
        record_run(ctx, self.id(), SettingsSlot::DailyPost, now);
        Ok(JobOutcome::Ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::test_support::{test_context, Sent, CHANNEL};
    use crate::content::JsonContentProvider;
    use crate::schedule_store::SettingsStore;
    use chrono::TimeZone;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 11, h, m, s).unwrap()
    }

    fn activate(ctx: &JobContext) {
        let mut settings = ctx.settings_store.get().unwrap();
        settings.daily_post.active = true;
        settings.daily_post.time = "09:00".to_string();
        ctx.settings_store.save(&settings).unwrap();
    }

    #[tokio::test]
    async fn test_posts_once_per_day() {
        let (ctx, handles) = test_context();
        activate(&ctx);

        let first = DailyPostJob.tick(at(9, 0, 0), &ctx).await.unwrap();
        let second = DailyPostJob.tick(at(9, 0, 30), &ctx).await.unwrap();

        assert_eq!(first, JobOutcome::Ran);
        assert_eq!(second, JobOutcome::Skipped(SkipReason::AlreadyRanToday));
        let sent = handles.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], Sent::Item { to, .. } if to == CHANNEL));
        assert_eq!(
            handles.settings.get().unwrap().daily_post.last_run,
            Some(at(9, 0, 0))
        );
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (ctx, handles) = test_context();
        activate(&ctx);
        handles.notifier.failures.store(2, Ordering::SeqCst);

        let outcome = DailyPostJob.tick(at(9, 0, 0), &ctx).await.unwrap();

        assert_eq!(outcome, JobOutcome::Ran);
        assert_eq!(handles.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_do_not_advance_state() {
        let (ctx, handles) = test_context();
        activate(&ctx);
        handles.notifier.failures.store(3, Ordering::SeqCst);

        let result = DailyPostJob.tick(at(9, 0, 0), &ctx).await;

        assert!(matches!(result, Err(JobError::Delivery(_))));
        assert_eq!(handles.settings.get().unwrap().daily_post.last_run, None);

        // Still due later in the same minute
        let retry = DailyPostJob.tick(at(9, 0, 40), &ctx).await.unwrap();
        assert_eq!(retry, JobOutcome::Ran);
    }

    #[tokio::test]
    async fn test_empty_catalog_skips() {
        let (mut ctx, handles) = test_context();
        ctx.content = Arc::new(JsonContentProvider::from_items(vec![]));
        activate(&ctx);

        let outcome = DailyPostJob.tick(at(9, 0, 0), &ctx).await.unwrap();

        assert_eq!(outcome, JobOutcome::Skipped(SkipReason::NothingToSend));
        assert!(handles.notifier.sent().is_empty());
        assert_eq!(handles.settings.get().unwrap().daily_post.last_run, None);
    }
}
