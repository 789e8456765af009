use super::models::{DailyJobSettings, ScheduleSettings, Subscription, WeeklyJobSettings};
use super::schema::SCHEDULE_VERSIONED_SCHEMAS;
use super::{BackupSource, SettingsStore, SubscriptionStore};
use crate::sqlite_persistence::{read_schema_version, BASE_DB_VERSION};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

const SETTINGS_ROW_ID: i64 = 1;

pub struct SqliteScheduleStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteScheduleStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open schedule database")?;

        let latest = SCHEDULE_VERSIONED_SCHEMAS
            .last()
            .context("No schedule schema defined")?;

        if is_new_db {
            info!("Creating new schedule database at {:?}", path);
            latest.create(&conn)?;
        } else {
            let db_version = read_schema_version(&conn)?;
            if db_version < 1 {
                anyhow::bail!(
                    "Schedule database version {} is invalid (expected >= 1)",
                    db_version
                );
            }

            let schema = SCHEDULE_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version as i64 == db_version)
                .with_context(|| format!("Unknown schedule database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "Schedule database schema validation failed for version {}",
                    db_version
                )
            })?;

            if db_version < latest.version as i64 {
                info!(
                    "Migrating schedule database from version {} to {}",
                    db_version, latest.version
                );
                Self::migrate(&mut conn, db_version as usize)?;
            }
        }

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };
        store.seed_settings_if_missing()?;
        Ok(store)
    }

    fn migrate(conn: &mut Connection, from_version: usize) -> Result<()> {
        let tx = conn.transaction()?;
        let mut latest_from = from_version;
        for schema in SCHEDULE_VERSIONED_SCHEMAS
            .iter()
            .filter(|s| s.version > from_version)
        {
            info!(
                "Running schedule database migration from version {} to {}",
                latest_from, schema.version
            );
            if let Some(migration_fn) = schema.migration {
                migration_fn(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
            latest_from = schema.version;
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest_from),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn seed_settings_if_missing(&self) -> Result<()> {
        let exists = self
            .lock()
            .query_row(
                "SELECT 1 FROM schedule_settings WHERE id = ?1",
                params![SETTINGS_ROW_ID],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            self.write_settings(&ScheduleSettings::default())?;
        }
        Ok(())
    }

    fn write_settings(&self, settings: &ScheduleSettings) -> Result<()> {
        self.lock().execute(
            "INSERT OR REPLACE INTO schedule_settings (
                id,
                daily_active, daily_time, daily_last_run,
                theme_active, theme_weekday, theme_time, theme_last_run,
                health_active, health_time, health_last_run,
                report_active, report_weekday, report_time, report_last_run
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                SETTINGS_ROW_ID,
                settings.daily_post.active,
                settings.daily_post.time,
                format_datetime(settings.daily_post.last_run.as_ref()),
                settings.theme.active,
                settings.theme.weekday,
                settings.theme.time,
                format_datetime(settings.theme.last_run.as_ref()),
                settings.health.active,
                settings.health.time,
                format_datetime(settings.health.last_run.as_ref()),
                settings.report.active,
                settings.report.weekday,
                settings.report.time,
                format_datetime(settings.report.last_run.as_ref()),
            ],
        )?;
        Ok(())
    }

    /// Subscriptions regardless of their active flag.
    pub fn list_all_subscriptions(&self) -> Result<Vec<Subscription>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT user_id, active, time, last_run FROM subscriptions ORDER BY user_id")?;
        let subs = stmt
            .query_map([], row_to_subscription)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subs)
    }

    pub fn delete_subscription(&self, user_id: i64) -> Result<bool> {
        let deleted = self
            .lock()
            .execute("DELETE FROM subscriptions WHERE user_id = ?1", params![user_id])?;
        Ok(deleted > 0)
    }
}

fn format_datetime(dt: Option<&DateTime<Local>>) -> Option<String> {
    dt.map(|dt| dt.to_rfc3339())
}

/// A malformed value reads as "never ran" and is logged.
fn parse_datetime(value: Option<String>) -> Option<DateTime<Local>> {
    let s = value?;
    match DateTime::parse_from_rfc3339(&s) {
        Ok(dt) => Some(dt.with_timezone(&Local)),
        Err(e) => {
            warn!("Ignoring malformed timestamp {:?}: {}", s, e);
            None
        }
    }
}

fn row_to_settings(row: &Row) -> rusqlite::Result<ScheduleSettings> {
    Ok(ScheduleSettings {
        daily_post: DailyJobSettings {
            active: row.get("daily_active")?,
            time: row.get("daily_time")?,
            last_run: parse_datetime(row.get("daily_last_run")?),
        },
        theme: WeeklyJobSettings {
            active: row.get("theme_active")?,
            weekday: row.get("theme_weekday")?,
            time: row.get("theme_time")?,
            last_run: parse_datetime(row.get("theme_last_run")?),
        },
        health: DailyJobSettings {
            active: row.get("health_active")?,
            time: row.get("health_time")?,
            last_run: parse_datetime(row.get("health_last_run")?),
        },
        report: WeeklyJobSettings {
            active: row.get("report_active")?,
            weekday: row.get("report_weekday")?,
            time: row.get("report_time")?,
            last_run: parse_datetime(row.get("report_last_run")?),
        },
    })
}

fn row_to_subscription(row: &Row) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        user_id: row.get("user_id")?,
        active: row.get("active")?,
        time: row.get("time")?,
        last_run: parse_datetime(row.get("last_run")?),
    })
}

impl SettingsStore for SqliteScheduleStore {
    fn get(&self) -> Result<ScheduleSettings> {
        let settings = self
            .lock()
            .query_row(
                "SELECT * FROM schedule_settings WHERE id = ?1",
                params![SETTINGS_ROW_ID],
                row_to_settings,
            )
            .optional()?;
        Ok(settings.unwrap_or_default())
    }

    fn save(&self, settings: &ScheduleSettings) -> Result<()> {
        self.write_settings(settings)
    }
}

impl SubscriptionStore for SqliteScheduleStore {
    fn list_active(&self) -> Result<Vec<Subscription>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, active, time, last_run FROM subscriptions WHERE active = 1 ORDER BY user_id",
        )?;
        let subs = stmt
            .query_map([], row_to_subscription)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subs)
    }

    fn save(&self, subscription: &Subscription) -> Result<()> {
        self.lock().execute(
            "INSERT INTO subscriptions (user_id, active, time, last_run) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                active = excluded.active,
                time = excluded.time,
                last_run = excluded.last_run",
            params![
                subscription.user_id,
                subscription.active,
                subscription.time,
                format_datetime(subscription.last_run.as_ref()),
            ],
        )?;
        Ok(())
    }
}

impl BackupSource for SqliteScheduleStore {
    fn prepare_backup(&self) -> Result<PathBuf> {
        if let Err(e) = self.lock().execute_batch("VACUUM;") {
            warn!("VACUUM before backup failed, sending the file as-is: {}", e);
        }
        Ok(self.db_path.clone())
    }
}
