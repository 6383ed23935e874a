use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::models::{NewTaskRequest, Task, UpdateTaskRequest, nullable};
use crate::recurrence::{CompletedDate, Recurrence, SkippedDate};

const TASK_COLUMNS: &str = "id, user_id, title, description, due_date, start_date, completed, \
    is_archived, is_recurring, recurrence_pattern, recurrence_interval, recurrence_end_date, \
    completed_instances, created_at, updated_at";

#[derive(Debug, FromRow)]
struct TaskRow {
    id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    due_date: Option<NaiveDate>,
    start_date: Option<NaiveDate>,
    completed: bool,
    is_archived: bool,
    is_recurring: bool,
    recurrence_pattern: Option<String>,
    recurrence_interval: Option<i64>,
    recurrence_end_date: Option<NaiveDate>,
    completed_instances: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_task(self) -> Task {
        let recurrence = (self.is_recurring || self.recurrence_pattern.is_some()).then(|| {
            Recurrence::from_stored(
                self.is_recurring,
                self.recurrence_pattern.as_deref(),
                self.recurrence_interval,
                self.recurrence_end_date,
                self.completed_instances,
            )
        });

        Task {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            start_date: self.start_date,
            completed: self.completed,
            is_archived: self.is_archived,
            recurrence,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CompletionRow {
    instance_date: NaiveDate,
    completed_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SkipRow {
    instance_date: NaiveDate,
    skipped_at: DateTime<Utc>,
    reason: String,
}

/// Converts rows into tasks, loading completion and skip records for the
/// ones that carry a recurrence.
async fn hydrate(db: &SqlitePool, rows: Vec<TaskRow>) -> Result<Vec<Task>, sqlx::Error> {
    let mut tasks = Vec::with_capacity(rows.len());
    for row in rows {
        let mut task = row.into_task();
        if let Some(recurrence) = task.recurrence.as_mut() {
            load_instance_records(db, &task.id, recurrence).await?;
        }
        tasks.push(task);
    }
    Ok(tasks)
}

async fn load_instance_records(
    db: &SqlitePool,
    task_id: &str,
    recurrence: &mut Recurrence,
) -> Result<(), sqlx::Error> {
    recurrence.completed_dates = sqlx::query_as::<_, CompletionRow>(
        "SELECT instance_date, completed_at FROM instance_completions WHERE task_id = ? ORDER BY id",
    )
    .bind(task_id)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(|r| CompletedDate {
        date: r.instance_date,
        completed_at: r.completed_at,
    })
    .collect();

    recurrence.skipped_dates = sqlx::query_as::<_, SkipRow>(
        "SELECT instance_date, skipped_at, reason FROM instance_skips WHERE task_id = ? ORDER BY id",
    )
    .bind(task_id)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(|r| SkippedDate {
        date: r.instance_date,
        skipped_at: r.skipped_at,
        reason: r.reason,
    })
    .collect();

    Ok(())
}

pub async fn fetch_tasks(
    db: &SqlitePool,
    user_id: &str,
    include_archived: bool,
) -> Result<Vec<Task>, sqlx::Error> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 AND (?2 OR is_archived = 0) \
         ORDER BY updated_at DESC"
    );
    let rows = sqlx::query_as::<_, TaskRow>(&sql)
        .bind(user_id)
        .bind(include_archived)
        .fetch_all(db)
        .await?;

    hydrate(db, rows).await
}

pub async fn find_task_by_id(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
) -> Result<Option<Task>, sqlx::Error> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND user_id = ?2");
    let row = sqlx::query_as::<_, TaskRow>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    match row {
        Some(row) => Ok(hydrate(db, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

pub async fn insert_task(
    db: &SqlitePool,
    user_id: &str,
    req: NewTaskRequest,
) -> Result<Task, sqlx::Error> {
    let now = Utc::now();
    let task = Task {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        title: req.title,
        description: req.description,
        due_date: req.due_date,
        start_date: req.start_date,
        completed: false,
        is_archived: false,
        recurrence: req.recurrence.map(|r| r.normalize()),
        created_at: now,
        updated_at: now,
    };

    persist_task(db, &task).await?;
    Ok(task)
}

pub async fn update_task(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    req: UpdateTaskRequest,
) -> Result<Option<Task>, sqlx::Error> {
    let mut current = match find_task_by_id(db, user_id, id).await? {
        Some(t) => t,
        None => return Ok(None),
    };

    if let Some(title) = req.title {
        current.title = title;
    }
    current.description = nullable::apply(req.description, current.description.take());
    current.due_date = nullable::apply(req.due_date, current.due_date);
    current.start_date = nullable::apply(req.start_date, current.start_date);
    if let Some(completed) = req.completed {
        current.completed = completed;
    }
    if let Some(input) = req.recurrence {
        current.recurrence = Some(match current.recurrence.take() {
            Some(existing) => input.apply_to(existing),
            None => input.normalize(),
        });
    }
    current.updated_at = Utc::now();

    persist_task(db, &current).await?;
    Ok(Some(current))
}

pub async fn archive_task(db: &SqlitePool, user_id: &str, id: &str) -> Result<bool, sqlx::Error> {
    set_archived(db, user_id, id, true).await
}

pub async fn unarchive_task(db: &SqlitePool, user_id: &str, id: &str) -> Result<bool, sqlx::Error> {
    set_archived(db, user_id, id, false).await
}

async fn set_archived(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    archived: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET is_archived = ?1,
            updated_at = ?2
        WHERE id = ?3 AND user_id = ?4
        "#,
    )
    .bind(archived)
    .bind(Utc::now())
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

/// Templates that can appear in `[start, end]` for one user: anything due
/// inside the window plus recurring series that have begun by `end` and not
/// ended before `start`.
pub async fn find_templates_overlapping_window(
    db: &SqlitePool,
    user_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Task>, sqlx::Error> {
    overlapping_window(db, Some(user_id), start, end).await
}

/// Same as [`find_templates_overlapping_window`] across every user.
pub async fn find_all_templates_overlapping_window(
    db: &SqlitePool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Task>, sqlx::Error> {
    overlapping_window(db, None, start, end).await
}

async fn overlapping_window(
    db: &SqlitePool,
    user_id: Option<&str>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Task>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {TASK_COLUMNS}
        FROM tasks
        WHERE is_archived = 0
          AND (?3 IS NULL OR user_id = ?3)
          AND (
            (due_date IS NOT NULL AND due_date BETWEEN ?1 AND ?2)
            OR (
              is_recurring = 1
              AND COALESCE(start_date, due_date, substr(created_at, 1, 10)) <= ?2
              AND (recurrence_end_date IS NULL OR recurrence_end_date >= ?1)
            )
          )
        ORDER BY created_at
        "#
    );
    let rows = sqlx::query_as::<_, TaskRow>(&sql)
        .bind(start)
        .bind(end)
        .bind(user_id)
        .fetch_all(db)
        .await?;

    hydrate(db, rows).await
}

/// Writes the whole template, replacing its completion and skip records, in
/// one transaction. Last writer wins.
pub async fn persist_task(db: &SqlitePool, task: &Task) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    let recurrence = task.recurrence.as_ref();
    sqlx::query(
        r#"
        INSERT INTO tasks
            (id, user_id, title, description, due_date, start_date, completed, is_archived,
            is_recurring, recurrence_pattern, recurrence_interval, recurrence_end_date,
            completed_instances, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            due_date = excluded.due_date,
            start_date = excluded.start_date,
            completed = excluded.completed,
            is_archived = excluded.is_archived,
            is_recurring = excluded.is_recurring,
            recurrence_pattern = excluded.recurrence_pattern,
            recurrence_interval = excluded.recurrence_interval,
            recurrence_end_date = excluded.recurrence_end_date,
            completed_instances = excluded.completed_instances,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&task.id)
    .bind(&task.user_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.due_date)
    .bind(task.start_date)
    .bind(task.completed)
    .bind(task.is_archived)
    .bind(recurrence.is_some_and(|r| r.is_recurring))
    .bind(recurrence.map(|r| r.pattern.as_str()))
    .bind(recurrence.map(|r| i64::from(r.interval)))
    .bind(recurrence.and_then(|r| r.end_date))
    .bind(recurrence.map_or(0, |r| i64::from(r.completed_instances)))
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM instance_completions WHERE task_id = ?")
        .bind(&task.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM instance_skips WHERE task_id = ?")
        .bind(&task.id)
        .execute(&mut *tx)
        .await?;

    if let Some(recurrence) = recurrence {
        for completion in &recurrence.completed_dates {
            sqlx::query(
                "INSERT INTO instance_completions (task_id, instance_date, completed_at) VALUES (?, ?, ?)",
            )
            .bind(&task.id)
            .bind(completion.date)
            .bind(completion.completed_at)
            .execute(&mut *tx)
            .await?;
        }
        for skip in &recurrence.skipped_dates {
            sqlx::query(
                "INSERT INTO instance_skips (task_id, instance_date, skipped_at, reason) VALUES (?, ?, ?, ?)",
            )
            .bind(&task.id)
            .bind(skip.date)
            .bind(skip.skipped_at)
            .bind(&skip.reason)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await
}

/// Records that a reminder for `task_id` on `date` went out. Returns `false`
/// when one was already recorded.
pub async fn claim_reminder(
    db: &SqlitePool,
    task_id: &str,
    date: NaiveDate,
    at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO reminder_deliveries (task_id, occurrence_date, delivered_at) VALUES (?, ?, ?)",
    )
    .bind(task_id)
    .bind(date)
    .bind(at)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result == 1)
}
