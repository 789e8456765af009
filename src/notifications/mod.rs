//! Outbound delivery: the transport seam and the admin directory.

pub mod admin;

pub use admin::AdminActions;

use crate::content::Item;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

/// Transport towards the chat platform.
///
/// Recipients are chat ids: the target channel for public posts, user ids
/// for private messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_item(&self, recipient: i64, item: &Item) -> Result<()>;
    async fn send_text(&self, recipient: i64, text: &str) -> Result<()>;
    async fn send_file(&self, recipient: i64, path: &Path, caption: &str) -> Result<()>;
}

/// Notifier that only logs what would have been sent.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_item(&self, recipient: i64, item: &Item) -> Result<()> {
        info!(
            "[deliver -> {}] item {} \"{}\" ({})",
            recipient, item.id, item.title, item.category
        );
        Ok(())
    }

    async fn send_text(&self, recipient: i64, text: &str) -> Result<()> {
        info!("[deliver -> {}] {}", recipient, text);
        Ok(())
    }

    async fn send_file(&self, recipient: i64, path: &Path, caption: &str) -> Result<()> {
        anyhow::ensure!(path.exists(), "file {:?} does not exist", path);
        info!("[deliver -> {}] file {:?}: {}", recipient, path, caption);
        Ok(())
    }
}

pub trait RecipientDirectory: Send + Sync {
    fn admin_ids(&self) -> Vec<i64>;
}

/// Admin list fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticRecipientDirectory {
    admins: Vec<i64>,
}

impl StaticRecipientDirectory {
    pub fn new(admins: Vec<i64>) -> Self {
        Self { admins }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }
}

impl RecipientDirectory for StaticRecipientDirectory {
    fn admin_ids(&self) -> Vec<i64> {
        self.admins.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_log_notifier_rejects_missing_file() {
        let dir = TempDir::new().unwrap();
        let notifier = LogNotifier;

        let missing = dir.path().join("missing.db");
        assert!(notifier.send_file(1, &missing, "backup").await.is_err());

        let present = dir.path().join("present.db");
        std::fs::write(&present, "x").unwrap();
        assert!(notifier.send_file(1, &present, "backup").await.is_ok());
    }

    #[test]
    fn test_static_directory() {
        let directory = StaticRecipientDirectory::new(vec![10, 20]);
        assert_eq!(directory.admin_ids(), vec![10, 20]);
        assert!(directory.is_admin(20));
        assert!(!directory.is_admin(30));
    }
}
