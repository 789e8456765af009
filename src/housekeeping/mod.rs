//! Housekeeping driver.
//!
//! Runs every `interval` (30 minutes by default) independently of the job
//! scheduler: sweeps the rate-limit map, checks log rotation and runs the
//! runtime watchdog. Each step is isolated so one failing never skips the
//! others.

pub mod rate_limit;
pub mod watchdog;

pub use rate_limit::{RateLimitConfig, UserRateLimiter};
pub use watchdog::{
    ProcessProbe, RuntimeProbe, RuntimeSample, RuntimeWatchdog, WatchdogConfig, WatchdogReport,
    WatchdogWarning,
};

use crate::logging::LogRotator;
use crate::tasks::run_supervised;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const DEFAULT_HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(30 * 60);

pub struct Housekeeper {
    interval: Duration,
    rate_limiter: Arc<UserRateLimiter>,
    rotator: Option<Arc<LogRotator>>,
    watchdog: Arc<RuntimeWatchdog>,
}

impl Housekeeper {
    pub fn new(
        interval: Duration,
        rate_limiter: Arc<UserRateLimiter>,
        rotator: Option<Arc<LogRotator>>,
        watchdog: Arc<RuntimeWatchdog>,
    ) -> Self {
        Self {
            interval,
            rate_limiter,
            rotator,
            watchdog,
        }
    }

    /// One housekeeping pass.
    pub async fn run_once(&self) {
        let ttl = self.rate_limiter.config().ttl;
        let rate_limiter = self.rate_limiter.clone();
        if let Some(removed) = run_supervised("rate-limit-sweep", async move {
            rate_limiter.sweep(ttl)
        })
        .await
        {
            if removed > 0 {
                info!("Swept {} stale rate limit entries", removed);
            }
        }

        if let Some(rotator) = &self.rotator {
            let rotator = rotator.clone();
            run_supervised("log-rotation", async move {
                // Compression continues in the background
                let _ = rotator.check_and_rotate();
            })
            .await;
        }

        let watchdog = self.watchdog.clone();
        run_supervised("watchdog", async move {
            watchdog.check();
        })
        .await;
    }

    /// Loop until `shutdown` is cancelled. The first pass happens one
    /// interval after start.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Housekeeping every {} minutes",
            self.interval.as_secs() / 60
        );
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Housekeeping stopped");
                    break;
                }
                _ = interval.tick() => {
                    debug!("Housekeeping pass");
                    self.run_once().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    struct CountingProbe;

    impl RuntimeProbe for CountingProbe {
        fn sample(&self) -> RuntimeSample {
            RuntimeSample {
                tasks: 5,
                memory_bytes: 1024,
            }
        }
    }

    fn housekeeper(interval: Duration) -> (Housekeeper, Arc<UserRateLimiter>, Arc<RuntimeWatchdog>) {
        let limiter = Arc::new(UserRateLimiter::new(RateLimitConfig {
            min_interval: Duration::from_secs(1),
            ttl: Duration::from_millis(1),
        }));
        let watchdog = Arc::new(RuntimeWatchdog::new(
            Box::new(CountingProbe),
            WatchdogConfig::default(),
        ));
        (
            Housekeeper::new(interval, limiter.clone(), None, watchdog.clone()),
            limiter,
            watchdog,
        )
    }

    #[tokio::test]
    async fn test_run_once_sweeps_and_checks() {
        let (keeper, limiter, watchdog) = housekeeper(Duration::from_secs(60));
        limiter.check_and_record_at(1, false, Instant::now() - Duration::from_secs(5));

        keeper.run_once().await;

        assert!(limiter.is_empty());
        assert_eq!(watchdog.last_task_count(), 5);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (keeper, _, _) = housekeeper(Duration::from_secs(3600));
        let token = CancellationToken::new();
        let handle = tokio::spawn(keeper.run(token.clone()));

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("housekeeping should stop")
            .unwrap();
    }
}
