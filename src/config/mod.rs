mod file_config;

pub use file_config::{
    FileConfig, HeavyTasksConfig, HousekeepingConfig, LoggingConfig, SchedulerConfig,
    WatchdogFileConfig,
};

use crate::background_jobs::JobOptions;
use crate::housekeeping::{RateLimitConfig, WatchdogConfig, DEFAULT_HOUSEKEEPING_INTERVAL};
use crate::logging::RotationSettings;
use crate::tasks::{RetryPolicy, DEFAULT_HEAVY_CAPACITY};
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "ophelia.db";
const DEFAULT_LOGS_DIR: &str = "logs";
const DEFAULT_CONTENT_PATH: &str = "content.json";

const MB: u64 = 1024 * 1024;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
    pub content_path: Option<PathBuf>,
    pub channel_id: Option<i64>,
    pub admin_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
    pub content_path: PathBuf,
    pub channel_id: i64,
    pub admin_ids: Vec<i64>,

    // Feature configs (with defaults)
    pub jobs: JobOptions,
    pub housekeeping_interval: Duration,
    pub rate_limit: RateLimitConfig,
    pub rotation: RotationSettings,
    pub watchdog: WatchdogConfig,
    pub heavy_capacity: usize,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
        let logs_dir = file
            .logs_dir
            .map(PathBuf::from)
            .or_else(|| cli.logs_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOGS_DIR));
        let content_path = file
            .content_path
            .map(PathBuf::from)
            .or_else(|| cli.content_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_PATH));

        let channel_id = file.channel_id.or(cli.channel_id).ok_or_else(|| {
            anyhow::anyhow!("channel_id must be specified via --channel-id or in config file")
        })?;
        let admin_ids = file.admin_ids.unwrap_or_else(|| cli.admin_ids.clone());

        // Scheduler settings - merge file config with defaults
        let scheduler = file.scheduler.unwrap_or_default();
        let default_jobs = JobOptions::default();
        let retry_attempts = scheduler
            .retry_attempts
            .unwrap_or(default_jobs.retry.attempts);
        if retry_attempts == 0 {
            bail!("scheduler.retry_attempts must be at least 1");
        }
        let jobs = JobOptions {
            retry: RetryPolicy::new(
                retry_attempts,
                scheduler
                    .retry_base_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default_jobs.retry.base_delay),
            ),
            theme_items: scheduler.theme_items.unwrap_or(default_jobs.theme_items),
            theme_item_pause: scheduler
                .theme_item_pause_ms
                .map(Duration::from_millis)
                .unwrap_or(default_jobs.theme_item_pause),
        };

        let hk = file.housekeeping.unwrap_or_default();
        let housekeeping_interval = hk
            .interval_minutes
            .map(|m| Duration::from_secs(m.saturating_mul(60)))
            .unwrap_or(DEFAULT_HOUSEKEEPING_INTERVAL);
        if housekeeping_interval.is_zero() {
            bail!("housekeeping.interval_minutes must be at least 1");
        }
        let default_rate_limit = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            min_interval: hk
                .rate_limit_min_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(default_rate_limit.min_interval),
            ttl: hk
                .rate_limit_ttl_hours
                .map(|h| Duration::from_secs(h.saturating_mul(60 * 60)))
                .unwrap_or(default_rate_limit.ttl),
        };

        let logging = file.logging.unwrap_or_default();
        let default_rotation = RotationSettings::default();
        let rotation = RotationSettings {
            max_size_bytes: logging
                .max_size_mb
                .map(|mb| mb.saturating_mul(MB))
                .unwrap_or(default_rotation.max_size_bytes),
            max_backups: logging.max_backups.unwrap_or(default_rotation.max_backups),
        };

        let wd = file.watchdog.unwrap_or_default();
        let default_watchdog = WatchdogConfig::default();
        let watchdog = WatchdogConfig {
            leak_delta: wd.leak_delta.unwrap_or(default_watchdog.leak_delta),
            max_tasks: wd.max_tasks.unwrap_or(default_watchdog.max_tasks),
            max_memory_bytes: wd
                .max_memory_mb
                .map(|mb| mb.saturating_mul(MB))
                .unwrap_or(default_watchdog.max_memory_bytes),
            heartbeat_interval: wd
                .heartbeat_hours
                .map(|h| Duration::from_secs(h.saturating_mul(60 * 60)))
                .unwrap_or(default_watchdog.heartbeat_interval),
        };

        let heavy_capacity = file
            .heavy_tasks
            .unwrap_or_default()
            .capacity
            .unwrap_or(DEFAULT_HEAVY_CAPACITY);
        if heavy_capacity == 0 {
            bail!("heavy_tasks.capacity must be at least 1");
        }

        Ok(Self {
            db_path,
            logs_dir,
            content_path,
            channel_id,
            admin_ids,
            jobs,
            housekeeping_interval,
            rate_limit,
            rotation,
            watchdog,
            heavy_capacity,
        })
    }
}
