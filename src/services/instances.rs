use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::db::repository;
use crate::error::AppError;
use crate::models::Task;

/// Completion and skip bookkeeping for single instances of a recurring task.
pub struct InstanceService {
    db: SqlitePool,
}

impl InstanceService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn complete(
        &self,
        user_id: &str,
        task_id: &str,
        instance_date: NaiveDate,
        completed: bool,
        at: DateTime<Utc>,
    ) -> Result<Task, AppError> {
        let mut task = self.load_recurring(user_id, task_id).await?;
        if let Some(rule) = task.active_recurrence_mut() {
            rule.mark_instance_completed(instance_date, completed, at);
        }
        task.updated_at = at;
        repository::persist_task(&self.db, &task).await?;

        info!(
            "instance {} of task {} marked completed={}",
            instance_date, task_id, completed
        );
        Ok(task)
    }

    pub async fn skip(
        &self,
        user_id: &str,
        task_id: &str,
        instance_date: NaiveDate,
        reason: String,
        at: DateTime<Utc>,
    ) -> Result<Task, AppError> {
        let mut task = self.load_recurring(user_id, task_id).await?;
        if let Some(rule) = task.active_recurrence_mut() {
            rule.mark_instance_skipped(instance_date, reason, at);
        }
        task.updated_at = at;
        repository::persist_task(&self.db, &task).await?;

        info!("instance {} of task {} skipped", instance_date, task_id);
        Ok(task)
    }

    async fn load_recurring(&self, user_id: &str, task_id: &str) -> Result<Task, AppError> {
        let task = repository::find_task_by_id(&self.db, user_id, task_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if task.active_recurrence().is_none() {
            return Err(AppError::NotRecurring);
        }
        Ok(task)
    }
}
