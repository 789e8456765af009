//! In-memory collaborators for unit tests.

use super::context::{JobContext, JobOptions};
use crate::content::{ContentProvider, Item, JsonContentProvider};
use crate::notifications::{Notifier, StaticRecipientDirectory};
use crate::reports::{ReportBuilder, StatusBuilder, ThemePicker};
use crate::schedule_store::{BackupSource, ScheduleSettings, SettingsStore, Subscription, SubscriptionStore};
use crate::tasks::RetryPolicy;
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct MemorySettingsStore(pub Mutex<ScheduleSettings>);

impl SettingsStore for MemorySettingsStore {
    fn get(&self) -> Result<ScheduleSettings> {
        Ok(self.0.lock().unwrap().clone())
    }

    fn save(&self, settings: &ScheduleSettings) -> Result<()> {
        *self.0.lock().unwrap() = settings.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySubscriptionStore(pub Mutex<Vec<Subscription>>);

impl SubscriptionStore for MemorySubscriptionStore {
    fn list_active(&self) -> Result<Vec<Subscription>> {
        Ok(self.0.lock().unwrap().iter().filter(|s| s.active).cloned().collect())
    }

    fn save(&self, subscription: &Subscription) -> Result<()> {
        let mut subs = self.0.lock().unwrap();
        match subs.iter_mut().find(|s| s.user_id == subscription.user_id) {
            Some(existing) => *existing = subscription.clone(),
            None => subs.push(subscription.clone()),
        }
        Ok(())
    }
}

pub struct FixedBackup(pub PathBuf);

impl BackupSource for FixedBackup {
    fn prepare_backup(&self) -> Result<PathBuf> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Item { to: i64, id: String },
    Text { to: i64, text: String },
    File { to: i64, caption: String },
}

/// Records deliveries; the first `failures` calls fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Sent>>,
    pub failures: AtomicUsize,
}

impl RecordingNotifier {
    fn attempt(&self, sent: Sent) -> Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            bail!("transport unavailable");
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_item(&self, recipient: i64, item: &Item) -> Result<()> {
        self.attempt(Sent::Item {
            to: recipient,
            id: item.id.clone(),
        })
    }

    async fn send_text(&self, recipient: i64, text: &str) -> Result<()> {
        self.attempt(Sent::Text {
            to: recipient,
            text: text.to_string(),
        })
    }

    async fn send_file(&self, recipient: i64, _path: &Path, caption: &str) -> Result<()> {
        self.attempt(Sent::File {
            to: recipient,
            caption: caption.to_string(),
        })
    }
}

pub struct FixedReports;

impl ReportBuilder for FixedReports {
    fn weekly_report(&self) -> Result<String> {
        Ok("weekly".to_string())
    }

    fn audit_report(&self) -> Result<String> {
        Ok("audit".to_string())
    }
}

impl StatusBuilder for FixedReports {
    fn status_text(&self) -> Result<String> {
        Ok("status".to_string())
    }
}

pub struct FixedTheme(pub Option<String>);

impl ThemePicker for FixedTheme {
    fn pick(&self, _now: DateTime<Local>) -> Option<String> {
        self.0.clone()
    }
}

pub fn item(id: &str, category: &str) -> Item {
    Item {
        id: id.to_string(),
        title: format!("Title {}", id),
        category: category.to_string(),
        body: String::new(),
    }
}

pub struct TestHandles {
    pub settings: Arc<MemorySettingsStore>,
    pub subscriptions: Arc<MemorySubscriptionStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub const CHANNEL: i64 = -100;
pub const ADMINS: [i64; 2] = [1, 2];

/// Context with fast retries, two admins and a small catalog.
pub fn test_context() -> (JobContext, TestHandles) {
    let settings = Arc::new(MemorySettingsStore::default());
    let subscriptions = Arc::new(MemorySubscriptionStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let content: Arc<dyn ContentProvider> = Arc::new(JsonContentProvider::from_items(vec![
        item("a", "science"),
        item("b", "science"),
        item("c", "art"),
    ]));

    let ctx = JobContext {
        cancellation_token: CancellationToken::new(),
        settings_store: settings.clone(),
        subscription_store: subscriptions.clone(),
        backup_source: Arc::new(FixedBackup(PathBuf::from("backup.db"))),
        content,
        notifier: notifier.clone(),
        recipients: Arc::new(StaticRecipientDirectory::new(ADMINS.to_vec())),
        reports: Arc::new(FixedReports),
        status: Arc::new(FixedReports),
        themes: Arc::new(FixedTheme(Some("science".to_string()))),
        channel_id: CHANNEL,
        options: JobOptions {
            retry: RetryPolicy::new(3, Duration::from_millis(1)),
            theme_items: 3,
            theme_item_pause: Duration::from_millis(1),
        },
    };

    (
        ctx,
        TestHandles {
            settings,
            subscriptions,
            notifier,
        },
    )
}
