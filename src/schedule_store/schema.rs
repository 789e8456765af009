//! SQLite schema of the schedule database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Job settings and subscriptions
// =============================================================================

/// Single-row table (id = 1) holding the configuration of every job
const SCHEDULE_SETTINGS_TABLE_V1: Table = Table {
    name: "schedule_settings",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("daily_active", &SqlType::Integer, non_null = true),
        sqlite_column!("daily_time", &SqlType::Text, non_null = true),
        sqlite_column!("daily_last_run", &SqlType::Text),
        sqlite_column!("theme_active", &SqlType::Integer, non_null = true),
        sqlite_column!("theme_weekday", &SqlType::Integer, non_null = true),
        sqlite_column!("theme_time", &SqlType::Text, non_null = true),
        sqlite_column!("theme_last_run", &SqlType::Text),
        sqlite_column!("health_active", &SqlType::Integer, non_null = true),
        sqlite_column!("health_time", &SqlType::Text, non_null = true),
        sqlite_column!("health_last_run", &SqlType::Text),
        sqlite_column!("report_active", &SqlType::Integer, non_null = true),
        sqlite_column!("report_weekday", &SqlType::Integer, non_null = true),
        sqlite_column!("report_time", &SqlType::Text, non_null = true),
        sqlite_column!("report_last_run", &SqlType::Text),
    ],
    indices: &[],
};

/// Per-user daily deliveries
const SUBSCRIPTIONS_TABLE_V1: Table = Table {
    name: "subscriptions",
    columns: &[
        sqlite_column!("user_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("active", &SqlType::Integer, non_null = true),
        sqlite_column!("time", &SqlType::Text, non_null = true),
        sqlite_column!("last_run", &SqlType::Text),
    ],
    indices: &[("idx_subscriptions_active", "active")],
};

pub const SCHEDULE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[SCHEDULE_SETTINGS_TABLE_V1, SUBSCRIPTIONS_TABLE_V1],
    migration: None,
}];
