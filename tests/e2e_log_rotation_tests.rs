//! End-to-end tests for log rotation and the housekeeping pass.

use ophelia_daemon::housekeeping::{
    Housekeeper, RateLimitConfig, RuntimeProbe, RuntimeSample, RuntimeWatchdog, UserRateLimiter,
    WatchdogConfig,
};
use ophelia_daemon::logging::{LogRotator, LogSinks, LogStream, RotationSettings};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

fn write_main(sinks: &LogSinks, bytes: usize) {
    sinks.with_stream(LogStream::Main, |file| {
        let file = file.as_mut().expect("main log should be open");
        file.write_all(&vec![b'x'; bytes]).unwrap();
    });
}

fn rotator(dir: &Path, max_size_bytes: u64) -> (Arc<LogSinks>, Arc<LogRotator>) {
    let sinks = Arc::new(LogSinks::open(dir).unwrap());
    let rotator = Arc::new(LogRotator::new(
        sinks.clone(),
        RotationSettings {
            max_size_bytes,
            max_backups: 10,
        },
    ));
    (sinks, rotator)
}

#[tokio::test]
async fn test_oversized_log_rotated_and_compressed() {
    let dir = TempDir::new().unwrap();
    let (sinks, rotator) = rotator(dir.path(), 1024);
    write_main(&sinks, 4096);

    let handles = rotator.check_and_rotate();
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.await.unwrap();
    }

    let names = file_names(dir.path());
    let gz: Vec<&String> = names
        .iter()
        .filter(|n| n.starts_with("bot-") && n.ends_with(".log.gz"))
        .collect();
    assert_eq!(gz.len(), 1, "files: {:?}", names);
    assert!(!names
        .iter()
        .any(|n| n.starts_with("bot-") && n.ends_with(".log")));
    assert_eq!(fs::metadata(dir.path().join("bot.log")).unwrap().len(), 0);

    // New lines land in the fresh file
    write_main(&sinks, 10);
    assert_eq!(fs::metadata(dir.path().join("bot.log")).unwrap().len(), 10);
}

#[tokio::test]
async fn test_small_logs_left_alone() {
    let dir = TempDir::new().unwrap();
    let (sinks, rotator) = rotator(dir.path(), 1024);
    write_main(&sinks, 100);

    assert!(rotator.check_and_rotate().is_empty());
    assert_eq!(file_names(dir.path()), vec!["bot.log", "errors.log"]);
}

struct QuietProbe;

impl RuntimeProbe for QuietProbe {
    fn sample(&self) -> RuntimeSample {
        RuntimeSample {
            tasks: 5,
            memory_bytes: 1024,
        }
    }
}

#[tokio::test]
async fn test_housekeeping_pass_rotates_and_sweeps() {
    let dir = TempDir::new().unwrap();
    let (sinks, rotator) = rotator(dir.path(), 1024);
    write_main(&sinks, 2048);

    let rate_limiter = Arc::new(UserRateLimiter::new(RateLimitConfig {
        min_interval: Duration::from_secs(1),
        ttl: Duration::ZERO,
    }));
    rate_limiter.check_and_record(42, false);
    assert_eq!(rate_limiter.len(), 1);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let watchdog = Arc::new(RuntimeWatchdog::new(
        Box::new(QuietProbe),
        WatchdogConfig::default(),
    ));
    let housekeeper = Housekeeper::new(
        Duration::from_secs(60),
        rate_limiter.clone(),
        Some(rotator),
        watchdog.clone(),
    );

    housekeeper.run_once().await;

    assert!(rate_limiter.is_empty());
    assert_eq!(watchdog.last_task_count(), 5);
    assert_eq!(fs::metadata(dir.path().join("bot.log")).unwrap().len(), 0);
}
