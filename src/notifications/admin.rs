//! Admin-triggered heavy work: broadcasts and manual backups.
//!
//! Both run on the heavy task limiter, so at most a couple of them execute
//! at once no matter how many admins press the button.

use crate::background_jobs::jobs::deliver_backup;
use crate::background_jobs::JobContext;
use crate::tasks::HeavyTaskLimiter;
use chrono::Local;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Pause between two broadcast deliveries.
pub const BROADCAST_PACING: Duration = Duration::from_millis(50);

pub struct AdminActions {
    ctx: JobContext,
    limiter: HeavyTaskLimiter,
    pacing: Duration,
}

async fn notify(ctx: &JobContext, to: i64, text: &str) -> bool {
    let notifier = ctx.notifier.clone();
    let result = ctx
        .options
        .retry
        .run(|| {
            let notifier = notifier.clone();
            async move { notifier.send_text(to, text).await }
        })
        .await;
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to send message to {}: {}", to, e);
            false
        }
    }
}

impl AdminActions {
    pub fn new(ctx: JobContext, limiter: HeavyTaskLimiter) -> Self {
        Self {
            ctx,
            limiter,
            pacing: BROADCAST_PACING,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Announce `text` to every recipient in the background.
    ///
    /// The sender gets an acknowledgement right away and the delivery totals
    /// when the broadcast is done. Returns `None` if there was nobody to
    /// send to.
    pub async fn start_broadcast(
        &self,
        sender: i64,
        recipients: Vec<i64>,
        text: String,
    ) -> Option<JoinHandle<()>> {
        if recipients.is_empty() {
            notify(&self.ctx, sender, "There are no recipients to broadcast to.").await;
            return None;
        }

        notify(
            &self.ctx,
            sender,
            &format!("Broadcast to {} recipient(s) started.", recipients.len()),
        )
        .await;

        let ctx = self.ctx.clone();
        let pacing = self.pacing;
        Some(self.limiter.run_heavy("broadcast", async move {
            let message = format!("Announcement:\n\n{}", text);
            let mut delivered = 0;
            let mut failed = 0;
            for (i, recipient) in recipients.iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(pacing).await;
                }
                if notify(&ctx, *recipient, &message).await {
                    delivered += 1;
                } else {
                    failed += 1;
                }
            }
            info!(
                "Broadcast finished: {} delivered, {} failed",
                delivered, failed
            );
            notify(
                &ctx,
                sender,
                &format!(
                    "Broadcast finished: {} delivered, {} failed.",
                    delivered, failed
                ),
            )
            .await;
        }))
    }

    /// Run the backup now and report the result to `requester`.
    pub fn trigger_backup(&self, requester: i64) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        self.limiter.run_heavy("manual-backup", async move {
            let reply = match deliver_backup(&ctx, Local::now()).await {
                Ok(count) => format!("Backup sent to {} admin(s).", count),
                Err(e) => format!("Backup failed: {}", e),
            };
            notify(&ctx, requester, &reply).await;
        })
    }
}
