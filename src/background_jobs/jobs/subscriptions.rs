//! Per-user daily deliveries.

use crate::background_jobs::context::JobContext;
use crate::background_jobs::job::{evaluate, Decision, JobError, JobOutcome, JobWindow, ScheduledJob, SkipReason};
use crate::schedule_store::Subscription;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

pub const SUBSCRIPTION_HEADER: &str = "Your daily story";

pub struct SubscriptionsJob;

impl SubscriptionsJob {
    /// Deliver to one subscriber. Errors are logged here.
    ///
    /// Returns `false` if there was nothing to send.
    async fn deliver(&self, ctx: &JobContext, subscription: &Subscription) -> bool {
        let user = subscription.user_id;
        let Some(item) = ctx.content.random_item() else {
            warn!("Subscriptions: no item available for user {}", user);
            return false;
        };

        let notifier = ctx.notifier.clone();
        let header = ctx
            .options
            .retry
            .run(|| {
                let notifier = notifier.clone();
                async move { notifier.send_text(user, SUBSCRIPTION_HEADER).await }
            })
            .await;
        if let Err(e) = header {
            warn!("Subscriptions: header to user {} failed: {}", user, e);
            return true;
        }

        let sent = ctx
            .options
            .retry
            .run(|| {
                let notifier = notifier.clone();
                let item = &item;
                async move { notifier.send_item(user, item).await }
            })
            .await;
        match sent {
            Ok(()) => debug!("Subscriptions: sent item {} to user {}", item.id, user),
            Err(e) => warn!("Subscriptions: item to user {} failed: {}", user, e),
        }
        true
    }
}

#[async_trait]
impl ScheduledJob for SubscriptionsJob {
    fn id(&self) -> &'static str {
        "subscriptions"
    }

    fn description(&self) -> &'static str {
        "Send each subscriber their daily story at their chosen time"
    }

    async fn tick(&self, now: DateTime<Local>, ctx: &JobContext) -> Result<JobOutcome, JobError> {
        let subscriptions = ctx
            .subscription_store
            .list_active()
            .map_err(JobError::Persistence)?;

        let mut delivered = 0;
        for mut subscription in subscriptions {
            let window = JobWindow::daily(
                subscription.active,
                &subscription.time,
                subscription.last_run.as_ref(),
            );
            match evaluate(&window, &now) {
                Decision::Due => {}
                Decision::Skip(SkipReason::InvalidTime(time)) => {
                    warn!(
                        "Subscriptions: user {} has invalid time {:?}",
                        subscription.user_id, time
                    );
                    continue;
                }
                Decision::Skip(_) => continue,
            }

            if !self.deliver(ctx, &subscription).await {
                continue;
            }

            // Advanced after any attempt so a failing user is not retried
            // every minute of the same day
            subscription.last_run = Some(now);
            if let Err(e) = ctx.subscription_store.save(&subscription) {
                warn!(
                    "Subscriptions: failed to save last run for user {}: {}",
                    subscription.user_id, e
                );
            }
            delivered += 1;
        }

        if delivered == 0 {
            return Ok(JobOutcome::Skipped(SkipReason::NotTime));
        }
        info!("Subscriptions: processed {} subscriber(s)", delivered);
        Ok(JobOutcome::Ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::test_support::{test_context, Sent};
    use crate::schedule_store::SubscriptionStore;
    use chrono::TimeZone;
    use std::sync::atomic::Ordering;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 11, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn test_each_subscriber_at_their_own_time() {
        let (ctx, handles) = test_context();
        for sub in [
            Subscription::new(10, "08:00"),
            Subscription::new(11, "08:00"),
            Subscription::new(12, "21:30"),
        ] {
            handles.subscriptions.save(&sub).unwrap();
        }

        let outcome = SubscriptionsJob.tick(at(8, 0), &ctx).await.unwrap();
        assert_eq!(outcome, JobOutcome::Ran);

        let sent = handles.notifier.sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(
            sent[0],
            Sent::Text {
                to: 10,
                text: SUBSCRIPTION_HEADER.to_string()
            }
        );
        assert!(matches!(sent[1], Sent::Item { to: 10, .. }));

        let subs = handles.subscriptions.list_active().unwrap();
        assert_eq!(subs[0].last_run, Some(at(8, 0)));
        assert_eq!(subs[2].last_run, None);

        // Same day again: nothing new
        SubscriptionsJob.tick(at(8, 0), &ctx).await.unwrap();
        assert_eq!(handles.notifier.sent().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_header_still_marks_attempt() {
        let (ctx, handles) = test_context();
        handles
            .subscriptions
            .save(&Subscription::new(10, "08:00"))
            .unwrap();
        handles.notifier.failures.store(3, Ordering::SeqCst);

        SubscriptionsJob.tick(at(8, 0), &ctx).await.unwrap();

        assert!(handles.notifier.sent().is_empty());
        let subs = handles.subscriptions.list_active().unwrap();
        assert_eq!(subs[0].last_run, Some(at(8, 0)));
    }

    #[tokio::test]
    async fn test_invalid_time_does_not_block_others() {
        let (ctx, handles) = test_context();
        handles
            .subscriptions
            .save(&Subscription::new(10, "soon"))
            .unwrap();
        handles
            .subscriptions
            .save(&Subscription::new(11, "08:00"))
            .unwrap();

        SubscriptionsJob.tick(at(8, 0), &ctx).await.unwrap();

        let sent = handles.notifier.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|s| matches!(s, Sent::Text { to: 11, .. } | Sent::Item { to: 11, .. })));
    }

    #[tokio::test]
    async fn test_empty_catalog_leaves_subscriber_pending() {
        let (mut ctx, handles) = test_context();
        ctx.content = std::sync::Arc::new(crate::content::JsonContentProvider::from_items(vec![]));
        handles
            .subscriptions
            .save(&Subscription::new(10, "08:00"))
            .unwrap();

        let outcome = SubscriptionsJob.tick(at(8, 0), &ctx).await.unwrap();

        assert_eq!(outcome, JobOutcome::Skipped(SkipReason::NotTime));
        assert!(handles.notifier.sent().is_empty());
        assert_eq!(handles.subscriptions.list_active().unwrap()[0].last_run, None);
    }
}
