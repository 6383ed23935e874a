#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use taskboard::db::MIGRATOR;
use taskboard::models::Task;
use taskboard::recurrence::{Pattern, Recurrence};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    date(y, m, d).and_hms_opt(9, 0, 0).expect("valid time").and_utc()
}

/// One-connection pool so every query sees the same in-memory database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");
    MIGRATOR.run(&pool).await.expect("Failed to run migrations");
    pool
}

pub fn plain_task(id: &str, due: Option<NaiveDate>) -> Task {
    Task {
        id: id.to_string(),
        user_id: "user-1".to_string(),
        title: format!("task {}", id),
        description: None,
        due_date: due,
        start_date: None,
        completed: false,
        is_archived: false,
        recurrence: None,
        created_at: at(2024, 1, 1),
        updated_at: at(2024, 1, 1),
    }
}

pub fn recurring_task(
    id: &str,
    pattern: Pattern,
    interval: u32,
    start: Option<NaiveDate>,
    due: Option<NaiveDate>,
) -> Task {
    Task {
        start_date: start,
        recurrence: Some(Recurrence::new(pattern, interval)),
        ..plain_task(id, due)
    }
}
