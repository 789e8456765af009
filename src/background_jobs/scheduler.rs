use super::context::JobContext;
use super::job::{JobOutcome, ScheduledJob, SkipReason};
use crate::tasks::run_supervised;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// What happened to one job during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickResult {
    Ran,
    Skipped(SkipReason),
    Failed(String),
    Panicked,
}

/// Drives the registered jobs on a fixed tick.
///
/// Jobs are checked sequentially in registration order, so a slow action
/// delays the jobs after it for that tick.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn ScheduledJob>>,
    job_context: JobContext,
    tick_interval: Duration,
}

impl JobScheduler {
    pub fn new(job_context: JobContext, tick_interval: Duration) -> Self {
        Self {
            jobs: Vec::new(),
            job_context,
            tick_interval,
        }
    }

    /// Register a job. Jobs run in registration order.
    pub fn register_job(&mut self, job: Arc<dyn ScheduledJob>) {
        info!("Registering job: {} - {}", job.id(), job.description());
        self.jobs.push(job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn job_ids(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|job| job.id()).collect()
    }

    /// Check every job once against `now`.
    pub async fn run_tick(&self, now: DateTime<Local>) -> Vec<(&'static str, TickResult)> {
        let mut results = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            let job_id = job.id();
            let result = match run_supervised(job_id, job.tick(now, &self.job_context)).await {
                Some(Ok(JobOutcome::Ran)) => {
                    info!("Job {} completed", job_id);
                    TickResult::Ran
                }
                Some(Ok(JobOutcome::Skipped(reason))) => {
                    match &reason {
                        SkipReason::InvalidTime(time) => {
                            warn!("Job {} has an invalid time {:?}, skipping", job_id, time)
                        }
                        other => debug!("Job {} skipped: {:?}", job_id, other),
                    }
                    TickResult::Skipped(reason)
                }
                Some(Err(e)) => {
                    error!("Job {} failed: {}", job_id, e);
                    TickResult::Failed(e.to_string())
                }
                None => TickResult::Panicked,
            };
            results.push((job_id, result));
        }
        results
    }

    /// Main scheduler loop. Returns once `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Starting job scheduler with {} registered jobs, tick every {:?}",
            self.jobs.len(),
            self.tick_interval
        );

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    self.run_tick(Local::now()).await;
                }
            }
        }

        info!("Job scheduler stopped");
    }
}
