//! End-to-end tests for the job scheduler against a real SQLite store.

mod common;

use chrono::{DateTime, Local, TimeZone};
use common::{Sent, TestEnv, ADMIN_IDS, CHANNEL_ID, ITEM_1_ID, ITEM_2_ID, ITEM_3_ID};
use ophelia_daemon::background_jobs::jobs::{default_jobs, SUBSCRIPTION_HEADER};
use ophelia_daemon::background_jobs::{JobScheduler, SkipReason, TickResult, DEFAULT_TICK_INTERVAL};
use ophelia_daemon::schedule_store::{SettingsStore, SqliteScheduleStore, Subscription, SubscriptionStore};
use std::sync::Arc;

// 2024-03-11 is a Monday
fn monday(h: u32, m: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 3, 11, h, m, s).unwrap()
}

fn scheduler(env: &TestEnv) -> JobScheduler {
    let mut scheduler = JobScheduler::new(env.context.clone(), DEFAULT_TICK_INTERVAL);
    for job in default_jobs() {
        scheduler.register_job(job);
    }
    scheduler
}

fn result_of(results: &[(&'static str, TickResult)], id: &str) -> TickResult {
    results
        .iter()
        .find(|(job, _)| *job == id)
        .map(|(_, result)| result.clone())
        .unwrap_or_else(|| panic!("no result for {}", id))
}

fn enable_daily_post(store: &SqliteScheduleStore, time: &str) {
    let mut settings = SettingsStore::get(store).unwrap();
    settings.daily_post.active = true;
    settings.daily_post.time = time.to_string();
    SettingsStore::save(store, &settings).unwrap();
}

#[tokio::test]
async fn test_jobs_registered_in_fixed_order() {
    let env = TestEnv::new();
    assert_eq!(
        scheduler(&env).job_ids(),
        vec![
            "daily_post",
            "weekly_backup",
            "subscriptions",
            "weekly_theme",
            "health_report",
            "weekly_report"
        ]
    );
}

#[tokio::test]
async fn test_daily_post_fires_once_per_day() {
    let env = TestEnv::new();
    enable_daily_post(&env.store, "09:00");
    let yesterday = monday(9, 0, 0) - chrono::Duration::days(1);
    let mut settings = SettingsStore::get(&*env.store).unwrap();
    settings.daily_post.last_run = Some(yesterday);
    SettingsStore::save(&*env.store, &settings).unwrap();
    let scheduler = scheduler(&env);

    let before = scheduler.run_tick(monday(8, 59, 0)).await;
    assert_eq!(
        result_of(&before, "daily_post"),
        TickResult::Skipped(SkipReason::NotTime)
    );

    let first = scheduler.run_tick(monday(9, 0, 0)).await;
    assert_eq!(result_of(&first, "daily_post"), TickResult::Ran);

    let second = scheduler.run_tick(monday(9, 0, 30)).await;
    assert_eq!(
        result_of(&second, "daily_post"),
        TickResult::Skipped(SkipReason::AlreadyRanToday)
    );

    let posted = env.notifier.items_to(CHANNEL_ID);
    assert_eq!(posted.len(), 1);
    assert!([ITEM_1_ID, ITEM_2_ID, ITEM_3_ID].contains(&posted[0].as_str()));

    let settings = SettingsStore::get(&*env.store).unwrap();
    assert_eq!(settings.daily_post.last_run, Some(monday(9, 0, 0)));
}

#[tokio::test]
async fn test_last_run_survives_restart() {
    let env = TestEnv::new();
    enable_daily_post(&env.store, "09:00");
    scheduler(&env).run_tick(monday(9, 0, 0)).await;
    assert_eq!(env.notifier.items_to(CHANNEL_ID).len(), 1);

    let db_path = env.store.db_path().to_path_buf();
    let TestEnv { dir, .. } = env;
    let reopened = Arc::new(SqliteScheduleStore::new(&db_path).unwrap());
    let env = TestEnv::with_store(dir, reopened);

    let results = scheduler(&env).run_tick(monday(9, 1, 0)).await;
    assert_eq!(
        result_of(&results, "daily_post"),
        TickResult::Skipped(SkipReason::AlreadyRanToday)
    );
    assert!(env.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_invalid_time_is_skipped_not_fatal() {
    let env = TestEnv::new();
    enable_daily_post(&env.store, "nine");

    let results = scheduler(&env).run_tick(monday(9, 0, 0)).await;

    assert_eq!(
        result_of(&results, "daily_post"),
        TickResult::Skipped(SkipReason::InvalidTime("nine".to_string()))
    );
    // The remaining jobs are still evaluated
    assert_eq!(results.len(), 6);
}

#[tokio::test]
async fn test_subscribers_served_at_their_time() {
    let env = TestEnv::new();
    SubscriptionStore::save(&*env.store, &Subscription::new(501, "07:30")).unwrap();
    SubscriptionStore::save(&*env.store, &Subscription::new(502, "20:00")).unwrap();
    let scheduler = scheduler(&env);

    let results = scheduler.run_tick(monday(7, 30, 0)).await;
    assert_eq!(result_of(&results, "subscriptions"), TickResult::Ran);
    scheduler.run_tick(monday(7, 31, 0)).await;

    let sent = env.notifier.sent();
    assert_eq!(
        sent[0],
        Sent::Text {
            to: 501,
            text: SUBSCRIPTION_HEADER.to_string()
        }
    );
    assert_eq!(env.notifier.items_to(501).len(), 1);
    assert!(env.notifier.items_to(502).is_empty());
}

#[tokio::test]
async fn test_weekly_backup_sends_database_to_admins() {
    let env = TestEnv::new();
    // 2024-03-10 is a Sunday
    let sunday = Local.with_ymd_and_hms(2024, 3, 10, 3, 0, 0).unwrap();

    let results = scheduler(&env).run_tick(sunday).await;

    assert_eq!(result_of(&results, "weekly_backup"), TickResult::Ran);
    let files: Vec<Sent> = env
        .notifier
        .sent()
        .into_iter()
        .filter(|s| matches!(s, Sent::File { .. }))
        .collect();
    assert_eq!(files.len(), ADMIN_IDS.len());
    assert_eq!(
        files[0],
        Sent::File {
            to: ADMIN_IDS[0],
            caption: "Weekly database backup 10.03.2024 03:00".to_string()
        }
    );
}
