use super::context::JobContext;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, NaiveTime, Timelike};
use thiserror::Error;

/// When a job may fire, as read from its persisted settings.
#[derive(Debug, Clone, Copy)]
pub struct JobWindow<'a> {
    pub active: bool,
    /// Required weekday (0 = Sunday) for weekly jobs, `None` for daily ones.
    pub weekday: Option<u32>,
    /// `"HH:MM"`
    pub time: &'a str,
    pub last_run: Option<&'a DateTime<Local>>,
}

impl<'a> JobWindow<'a> {
    pub fn daily(active: bool, time: &'a str, last_run: Option<&'a DateTime<Local>>) -> Self {
        Self {
            active,
            weekday: None,
            time,
            last_run,
        }
    }

    pub fn weekly(
        active: bool,
        weekday: u32,
        time: &'a str,
        last_run: Option<&'a DateTime<Local>>,
    ) -> Self {
        Self {
            active,
            weekday: Some(weekday),
            time,
            last_run,
        }
    }
}

/// Why a job did not fire on a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Inactive,
    AlreadyRanToday,
    /// The configured time could not be parsed.
    InvalidTime(String),
    WrongWeekday,
    NotTime,
    /// Due, but there was nothing to deliver.
    NothingToSend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Due,
    Skip(SkipReason),
}

/// Result of a job's tick that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Ran,
    Skipped(SkipReason),
}

/// Errors that can occur while running a job's action.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("persistence failed: {0}")]
    Persistence(anyhow::Error),

    #[error("delivery failed: {0}")]
    Delivery(anyhow::Error),

    #[error("content unavailable: {0}")]
    Content(String),

    #[error("job was cancelled")]
    Cancelled,
}

/// Calendar-day equality in local time.
pub fn is_same_day(a: &DateTime<Local>, b: &DateTime<Local>) -> bool {
    a.year() == b.year() && a.ordinal() == b.ordinal()
}

/// Parse a `"HH:MM"` wall clock time.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Decide whether a job described by `window` fires at `now`.
///
/// Fires only inside the exact configured minute; a window missed because
/// the process was down or the tick was late is not caught up.
pub fn evaluate(window: &JobWindow<'_>, now: &DateTime<Local>) -> Decision {
    if !window.active {
        return Decision::Skip(SkipReason::Inactive);
    }
    if let Some(last_run) = window.last_run {
        if is_same_day(last_run, now) {
            return Decision::Skip(SkipReason::AlreadyRanToday);
        }
    }
    let Some(target) = parse_time(window.time) else {
        return Decision::Skip(SkipReason::InvalidTime(window.time.to_string()));
    };
    if let Some(weekday) = window.weekday {
        if now.weekday().num_days_from_sunday() != weekday {
            return Decision::Skip(SkipReason::WrongWeekday);
        }
    }
    if now.hour() == target.hour() && now.minute() == target.minute() {
        Decision::Due
    } else {
        Decision::Skip(SkipReason::NotTime)
    }
}

/// `dd.mm.YYYY HH:MM`, or `never`.
pub fn describe_last_run(last_run: Option<&DateTime<Local>>) -> String {
    match last_run {
        Some(dt) => dt.format("%d.%m.%Y %H:%M").to_string(),
        None => "never".to_string(),
    }
}

/// A job driven by the minute scheduler.
///
/// `tick` is called once per scheduler tick. It performs the due-ness check
/// itself and, when due, runs the action and records the run.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Unique identifier for this job.
    fn id(&self) -> &'static str;

    /// Human-readable description.
    fn description(&self) -> &'static str;

    async fn tick(&self, now: DateTime<Local>, ctx: &JobContext) -> Result<JobOutcome, JobError>;
}
