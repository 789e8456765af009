//! Text builders for the admin reports and the weekly theme choice.

use crate::background_jobs::describe_last_run;
use crate::content::ContentProvider;
use crate::housekeeping::watchdog::format_duration;
use crate::housekeeping::RuntimeWatchdog;
use crate::schedule_store::{SettingsStore, SubscriptionStore};
use anyhow::Result;
use byte_unit::Byte;
use chrono::{DateTime, Datelike, Local};
use std::fmt::Write;
use std::sync::Arc;

/// Categories with fewer items than this are flagged by the audit.
const THIN_CATEGORY_THRESHOLD: usize = 3;

pub trait ReportBuilder: Send + Sync {
    fn weekly_report(&self) -> Result<String>;
    fn audit_report(&self) -> Result<String>;
}

pub trait StatusBuilder: Send + Sync {
    fn status_text(&self) -> Result<String>;
}

pub trait ThemePicker: Send + Sync {
    /// Category to feature for the week containing `now`.
    fn pick(&self, now: DateTime<Local>) -> Option<String>;
}

/// Reports computed from the content catalog and the subscription table.
pub struct CatalogReportBuilder {
    content: Arc<dyn ContentProvider>,
    subscriptions: Arc<dyn SubscriptionStore>,
}

impl CatalogReportBuilder {
    pub fn new(content: Arc<dyn ContentProvider>, subscriptions: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            content,
            subscriptions,
        }
    }
}

impl ReportBuilder for CatalogReportBuilder {
    fn weekly_report(&self) -> Result<String> {
        let counts = self.content.count_by_category();
        let total: usize = counts.values().sum();
        let subscribers = self.subscriptions.list_active()?.len();

        let mut out = String::from("📊 Weekly report\n");
        writeln!(out, "Items: {}", total)?;
        writeln!(out, "Active subscriptions: {}", subscribers)?;
        for (category, count) in &counts {
            writeln!(out, "  {}: {}", category, count)?;
        }
        Ok(out)
    }

    fn audit_report(&self) -> Result<String> {
        let counts = self.content.count_by_category();
        let thin: Vec<&str> = counts
            .iter()
            .filter(|(_, count)| **count < THIN_CATEGORY_THRESHOLD)
            .map(|(category, _)| category.as_str())
            .collect();

        let mut out = String::from("🔎 Audit\n");
        writeln!(out, "Categories: {}", counts.len())?;
        if counts.is_empty() {
            writeln!(out, "Catalog is empty")?;
        } else if thin.is_empty() {
            writeln!(out, "All categories have at least {} items", THIN_CATEGORY_THRESHOLD)?;
        } else {
            writeln!(
                out,
                "Categories with fewer than {} items: {}",
                THIN_CATEGORY_THRESHOLD,
                thin.join(", ")
            )?;
        }
        Ok(out)
    }
}

/// Status text from the schedule and the watchdog.
pub struct RuntimeStatusBuilder {
    settings: Arc<dyn SettingsStore>,
    watchdog: Arc<RuntimeWatchdog>,
}

impl RuntimeStatusBuilder {
    pub fn new(settings: Arc<dyn SettingsStore>, watchdog: Arc<RuntimeWatchdog>) -> Self {
        Self { settings, watchdog }
    }
}

fn on_off(active: bool) -> &'static str {
    if active {
        "on"
    } else {
        "off"
    }
}

impl StatusBuilder for RuntimeStatusBuilder {
    fn status_text(&self) -> Result<String> {
        let settings = self.settings.get()?;
        let sample = self.watchdog.sample();

        let mut out = String::from("🩺 Status\n");
        writeln!(out, "Version: {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "Uptime: {}", format_duration(self.watchdog.uptime()))?;
        writeln!(out, "Tasks: {}", sample.tasks)?;
        writeln!(out, "Memory: {:#}", Byte::from(sample.memory_bytes))?;
        writeln!(
            out,
            "Daily post: {} at {} (last: {})",
            on_off(settings.daily_post.active),
            settings.daily_post.time,
            describe_last_run(settings.daily_post.last_run.as_ref())
        )?;
        writeln!(
            out,
            "Theme: {} day {} at {} (last: {})",
            on_off(settings.theme.active),
            settings.theme.weekday,
            settings.theme.time,
            describe_last_run(settings.theme.last_run.as_ref())
        )?;
        writeln!(
            out,
            "Health: {} at {} (last: {})",
            on_off(settings.health.active),
            settings.health.time,
            describe_last_run(settings.health.last_run.as_ref())
        )?;
        writeln!(
            out,
            "Report: {} day {} at {} (last: {})",
            on_off(settings.report.active),
            settings.report.weekday,
            settings.report.time,
            describe_last_run(settings.report.last_run.as_ref())
        )?;
        Ok(out)
    }
}

/// Cycles through the catalog categories by ISO week.
pub struct RotatingThemePicker {
    content: Arc<dyn ContentProvider>,
}

impl RotatingThemePicker {
    pub fn new(content: Arc<dyn ContentProvider>) -> Self {
        Self { content }
    }
}

impl ThemePicker for RotatingThemePicker {
    fn pick(&self, now: DateTime<Local>) -> Option<String> {
        let categories = self.content.categories();
        if categories.is_empty() {
            return None;
        }
        let week = now.iso_week();
        let key = week.year() as i64 * 100 + week.week() as i64;
        let index = key.rem_euclid(categories.len() as i64) as usize;
        categories.into_iter().nth(index)
    }
}
