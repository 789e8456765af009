use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ophelia_daemon::background_jobs::{
    jobs::default_jobs, JobContext, JobScheduler, DEFAULT_TICK_INTERVAL,
};
use ophelia_daemon::config::{AppConfig, CliConfig, FileConfig};
use ophelia_daemon::content::{ContentProvider, JsonContentProvider};
use ophelia_daemon::housekeeping::{Housekeeper, ProcessProbe, RuntimeWatchdog, UserRateLimiter};
use ophelia_daemon::logging::init_logging;
use ophelia_daemon::notifications::{LogNotifier, StaticRecipientDirectory};
use ophelia_daemon::reports::{CatalogReportBuilder, RotatingThemePicker, RuntimeStatusBuilder};
use ophelia_daemon::schedule_store::SqliteScheduleStore;
use ophelia_daemon::tasks::{install_panic_hook, spawn_supervised};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override the flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database holding schedules and subscriptions.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Directory for the live and rotated log files.
    #[clap(long, value_parser = parse_path)]
    pub logs_dir: Option<PathBuf>,

    /// Path to the JSON content catalog.
    #[clap(long, value_parser = parse_path)]
    pub content_path: Option<PathBuf>,

    /// Chat id receiving the public posts.
    #[clap(long, allow_hyphen_values = true)]
    pub channel_id: Option<i64>,

    /// Comma separated admin user ids.
    #[clap(long, value_delimiter = ',')]
    pub admin_ids: Vec<i64>,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            db_path: args.db_path.clone(),
            logs_dir: args.logs_dir.clone(),
            content_path: args.content_path.clone(),
            channel_id: args.channel_id,
            admin_ids: args.admin_ids.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    let rotator = init_logging(&config.logs_dir, config.rotation);
    install_panic_hook();

    if let Some(rotator) = &rotator {
        // Rotate a log left oversized by the previous run
        let _ = rotator.check_and_rotate();
    }

    info!("Opening SQLite database at {:?}...", config.db_path);
    let store = Arc::new(
        SqliteScheduleStore::new(&config.db_path)
            .with_context(|| format!("Failed to open database {:?}", config.db_path))?,
    );

    let content: Arc<dyn ContentProvider> = match JsonContentProvider::load(&config.content_path) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            warn!("Content unavailable, posts will be skipped: {:#}", e);
            Arc::new(JsonContentProvider::from_items(vec![]))
        }
    };

    let watchdog = Arc::new(RuntimeWatchdog::new(
        Box::new(ProcessProbe::new()),
        config.watchdog.clone(),
    ));
    let rate_limiter = Arc::new(UserRateLimiter::new(config.rate_limit.clone()));
    let shutdown = CancellationToken::new();

    let job_context = JobContext {
        cancellation_token: shutdown.child_token(),
        settings_store: store.clone(),
        subscription_store: store.clone(),
        backup_source: store.clone(),
        content: content.clone(),
        notifier: Arc::new(LogNotifier),
        recipients: Arc::new(StaticRecipientDirectory::new(config.admin_ids.clone())),
        reports: Arc::new(CatalogReportBuilder::new(content.clone(), store.clone())),
        status: Arc::new(RuntimeStatusBuilder::new(store.clone(), watchdog.clone())),
        themes: Arc::new(RotatingThemePicker::new(content)),
        channel_id: config.channel_id,
        options: config.jobs.clone(),
    };

    let mut scheduler = JobScheduler::new(job_context, DEFAULT_TICK_INTERVAL);
    for job in default_jobs() {
        scheduler.register_job(job);
    }
    info!(
        "Registered {} jobs: {}",
        scheduler.job_count(),
        scheduler.job_ids().join(", ")
    );

    let housekeeper = Housekeeper::new(
        config.housekeeping_interval,
        rate_limiter,
        rotator,
        watchdog,
    );

    let scheduler_handle = spawn_supervised("scheduler", scheduler.run(shutdown.clone()));
    let housekeeping_handle = spawn_supervised("housekeeping", housekeeper.run(shutdown.clone()));

    info!("Ophelia daemon {} running", env!("CARGO_PKG_VERSION"));
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => error!("Cannot listen for Ctrl-C, shutting down: {}", e),
    }
    shutdown.cancel();

    let _ = scheduler_handle.await;
    let _ = housekeeping_handle.await;
    info!("Bye");
    Ok(())
}
