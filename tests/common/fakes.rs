use super::constants::*;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use ophelia_daemon::background_jobs::{JobContext, JobOptions};
use ophelia_daemon::content::{Item, JsonContentProvider};
use ophelia_daemon::notifications::{Notifier, StaticRecipientDirectory};
use ophelia_daemon::reports::{ReportBuilder, StatusBuilder, ThemePicker};
use ophelia_daemon::schedule_store::SqliteScheduleStore;
use ophelia_daemon::tasks::RetryPolicy;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Item { to: i64, id: String },
    Text { to: i64, text: String },
    File { to: i64, caption: String },
}

/// Notifier that records every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn items_to(&self, recipient: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Item { to, id } if to == recipient => Some(id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_item(&self, recipient: i64, item: &Item) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Item {
            to: recipient,
            id: item.id.clone(),
        });
        Ok(())
    }

    async fn send_text(&self, recipient: i64, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text {
            to: recipient,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_file(&self, recipient: i64, path: &Path, caption: &str) -> Result<()> {
        assert!(path.exists(), "backup file {:?} should exist", path);
        self.sent.lock().unwrap().push(Sent::File {
            to: recipient,
            caption: caption.to_string(),
        });
        Ok(())
    }
}

struct CannedReports;

impl ReportBuilder for CannedReports {
    fn weekly_report(&self) -> Result<String> {
        Ok("weekly report".to_string())
    }

    fn audit_report(&self) -> Result<String> {
        Ok("audit report".to_string())
    }
}

impl StatusBuilder for CannedReports {
    fn status_text(&self) -> Result<String> {
        Ok("all good".to_string())
    }
}

struct NoTheme;

impl ThemePicker for NoTheme {
    fn pick(&self, _now: DateTime<Local>) -> Option<String> {
        None
    }
}

fn item(id: &str, category: &str) -> Item {
    Item {
        id: id.to_string(),
        title: format!("Story {}", id),
        category: category.to_string(),
        body: "Once upon a time".to_string(),
    }
}

/// A SQLite store in a temp dir plus a job context wired to it.
pub struct TestEnv {
    pub dir: TempDir,
    pub store: Arc<SqliteScheduleStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub context: JobContext,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteScheduleStore::new(dir.path().join("bot.db")).unwrap());
        Self::with_store(dir, store)
    }

    /// Reuse an existing directory, e.g. to simulate a restart.
    pub fn with_store(dir: TempDir, store: Arc<SqliteScheduleStore>) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let context = JobContext {
            cancellation_token: CancellationToken::new(),
            settings_store: store.clone(),
            subscription_store: store.clone(),
            backup_source: store.clone(),
            content: Arc::new(JsonContentProvider::from_items(vec![
                item(ITEM_1_ID, "fairy tales"),
                item(ITEM_2_ID, "fairy tales"),
                item(ITEM_3_ID, "myths"),
            ])),
            notifier: notifier.clone(),
            recipients: Arc::new(StaticRecipientDirectory::new(ADMIN_IDS.to_vec())),
            reports: Arc::new(CannedReports),
            status: Arc::new(CannedReports),
            themes: Arc::new(NoTheme),
            channel_id: CHANNEL_ID,
            options: JobOptions {
                retry: RetryPolicy::new(3, Duration::from_millis(1)),
                theme_items: 2,
                theme_item_pause: Duration::from_millis(1),
            },
        };
        Self {
            dir,
            store,
            notifier,
            context,
        }
    }
}
