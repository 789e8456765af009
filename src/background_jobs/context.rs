use crate::content::ContentProvider;
use crate::notifications::{Notifier, RecipientDirectory};
use crate::reports::{ReportBuilder, StatusBuilder, ThemePicker};
use crate::schedule_store::{BackupSource, SettingsStore, SubscriptionStore};
use crate::tasks::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Delivery tuning shared by the jobs.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Retry policy for every outbound send.
    pub retry: RetryPolicy,
    /// How many items the weekly theme post carries.
    pub theme_items: usize,
    /// Pause between two theme items.
    pub theme_item_pause: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            theme_items: 3,
            theme_item_pause: Duration::from_millis(120),
        }
    }
}

/// Context provided to jobs during execution.
///
/// Bundles the collaborators every job may need plus the shutdown token.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for shutdown requests.
    pub cancellation_token: CancellationToken,

    pub settings_store: Arc<dyn SettingsStore>,
    pub subscription_store: Arc<dyn SubscriptionStore>,
    pub backup_source: Arc<dyn BackupSource>,
    pub content: Arc<dyn ContentProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub recipients: Arc<dyn RecipientDirectory>,
    pub reports: Arc<dyn ReportBuilder>,
    pub status: Arc<dyn StatusBuilder>,
    pub themes: Arc<dyn ThemePicker>,

    /// Chat receiving the public posts.
    pub channel_id: i64,
    pub options: JobOptions,
}

impl JobContext {
    /// Check if shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
