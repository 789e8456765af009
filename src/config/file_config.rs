use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub logs_dir: Option<String>,
    pub content_path: Option<String>,
    pub channel_id: Option<i64>,
    pub admin_ids: Option<Vec<i64>>,

    // Feature configs
    pub scheduler: Option<SchedulerConfig>,
    pub housekeeping: Option<HousekeepingConfig>,
    pub logging: Option<LoggingConfig>,
    pub watchdog: Option<WatchdogFileConfig>,
    pub heavy_tasks: Option<HeavyTasksConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub retry_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub theme_items: Option<usize>,
    pub theme_item_pause_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct HousekeepingConfig {
    pub interval_minutes: Option<u64>,
    pub rate_limit_ttl_hours: Option<u64>,
    pub rate_limit_min_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub max_size_mb: Option<u64>,
    pub max_backups: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct WatchdogFileConfig {
    pub leak_delta: Option<usize>,
    pub max_tasks: Option<usize>,
    pub max_memory_mb: Option<u64>,
    pub heartbeat_hours: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct HeavyTasksConfig {
    pub capacity: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
