use chrono::{DateTime, Local};

/// A job that runs at most once a day at `time`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyJobSettings {
    pub active: bool,
    /// `"HH:MM"`, 24h clock, local time.
    pub time: String,
    pub last_run: Option<DateTime<Local>>,
}

/// A job that runs at most once a week, on `weekday` at `time`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyJobSettings {
    pub active: bool,
    /// 0 = Sunday ... 6 = Saturday.
    pub weekday: u32,
    pub time: String,
    pub last_run: Option<DateTime<Local>>,
}

/// Persisted configuration and run history of the scheduled jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub daily_post: DailyJobSettings,
    pub theme: WeeklyJobSettings,
    pub health: DailyJobSettings,
    pub report: WeeklyJobSettings,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            daily_post: DailyJobSettings {
                active: false,
                time: "09:00".to_string(),
                last_run: None,
            },
            theme: WeeklyJobSettings {
                active: false,
                weekday: 0,
                time: "12:00".to_string(),
                last_run: None,
            },
            health: DailyJobSettings {
                active: false,
                time: "08:00".to_string(),
                last_run: None,
            },
            report: WeeklyJobSettings {
                active: false,
                weekday: 1,
                time: "10:00".to_string(),
                last_run: None,
            },
        }
    }
}

/// A user's personal daily delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub user_id: i64,
    pub active: bool,
    pub time: String,
    pub last_run: Option<DateTime<Local>>,
}

impl Subscription {
    pub fn new(user_id: i64, time: impl Into<String>) -> Self {
        Self {
            user_id,
            active: true,
            time: time.into(),
            last_run: None,
        }
    }
}
