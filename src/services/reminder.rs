use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::repository;
use crate::error::AppError;
use crate::models::Task;
use crate::notify::{Notification, Notifier};
use crate::services::calendar::occurrences_for;

pub struct ReminderService {
    db: SqlitePool,
    notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderStats {
    pub candidates: usize,
    pub sent: usize,
    pub already_sent: usize,
    pub failed: usize,
}

impl ReminderService {
    pub fn new(db: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Sends one reminder per open occurrence due on `today`. Delivery is
    /// best effort: a failed send is logged and counted, never retried.
    pub async fn run_once(
        &self,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<ReminderStats, AppError> {
        let templates =
            repository::find_all_templates_overlapping_window(&self.db, today, today).await?;
        let mut stats = ReminderStats::default();

        for task in &templates {
            for notification in due_notifications(task, today) {
                stats.candidates += 1;

                if !repository::claim_reminder(&self.db, &task.id, notification.date, now).await? {
                    debug!("reminder already sent: {} on {}", task.id, notification.date);
                    stats.already_sent += 1;
                    continue;
                }

                match self.notifier.send(&notification).await {
                    Ok(()) => stats.sent += 1,
                    Err(e) => {
                        warn!("Reminder for task {} failed: {:?}", task.id, e);
                        stats.failed += 1;
                    }
                }
            }
        }

        info!(
            "Reminder poll for {}: {} candidates, {} sent, {} already sent, {} failed",
            today, stats.candidates, stats.sent, stats.already_sent, stats.failed
        );
        Ok(stats)
    }
}

/// Occurrences of `task` on `today` that are still open. Skipped instances
/// get no reminder even though they stay on the calendar.
fn due_notifications(task: &Task, today: NaiveDate) -> Vec<Notification> {
    let rule = task.active_recurrence();
    occurrences_for(task, today, today)
        .into_iter()
        .filter(|o| {
            if o.is_generated_instance {
                rule.is_none_or(|r| !r.is_instance_completed(o.date) && !r.is_instance_skipped(o.date))
            } else {
                !task.completed
            }
        })
        .map(|o| Notification {
            user_id: task.user_id.clone(),
            task_id: task.id.clone(),
            title: task.title.clone(),
            body: format!("\"{}\" is due today", task.title),
            date: o.date,
            is_generated_instance: o.is_generated_instance,
        })
        .collect()
}
