use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::repository;
use crate::error::AppError;
use crate::models::Task;
use crate::recurrence::{self, Occurrence};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEntry {
    pub key: String,
    pub task_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub is_generated_instance: bool,
    pub is_recurring: bool,
    pub completed: bool,
    pub skipped: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarView {
    pub entries: Vec<CalendarEntry>,
    pub total: usize,
    pub recurring_instance_count: usize,
    pub original_count: usize,
}

pub struct CalendarService {
    db: SqlitePool,
}

impl CalendarService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn view(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CalendarView, AppError> {
        if start > end {
            return Ok(build_calendar(&[], start, end));
        }
        let templates =
            repository::find_templates_overlapping_window(&self.db, user_id, start, end).await?;
        debug!(
            "calendar {}..{}: {} templates for user {}",
            start,
            end,
            templates.len(),
            user_id
        );
        Ok(build_calendar(&templates, start, end))
    }
}

/// The original (when due inside the window) plus every generated instance
/// of one template, ordered by date.
pub fn occurrences_for(task: &Task, start: NaiveDate, end: NaiveDate) -> Vec<Occurrence> {
    let mut occurrences = Vec::new();
    if let Some(due) = task.due_date.filter(|d| *d >= start && *d <= end) {
        occurrences.push(Occurrence::original(&task.id, due));
    }
    let generated = recurrence::expand(task, start, end);
    occurrences.extend(recurrence::merge(task, &generated));
    occurrences.sort_by_key(|o| o.date);
    occurrences
}

/// Flattens templates into calendar rows sorted by date. Completion and
/// skip flags are annotations; nothing is filtered out because of them.
pub fn build_calendar(templates: &[Task], start: NaiveDate, end: NaiveDate) -> CalendarView {
    let mut entries: Vec<CalendarEntry> = templates
        .iter()
        .flat_map(|task| {
            occurrences_for(task, start, end)
                .into_iter()
                .map(move |occurrence| entry_for(task, occurrence))
        })
        .collect();
    entries.sort_by_key(|e| e.date);

    let recurring_instance_count = entries.iter().filter(|e| e.is_generated_instance).count();
    let total = entries.len();

    CalendarView {
        entries,
        total,
        recurring_instance_count,
        original_count: total - recurring_instance_count,
    }
}

fn entry_for(task: &Task, occurrence: Occurrence) -> CalendarEntry {
    let rule = task.active_recurrence();
    let (completed, skipped) = if occurrence.is_generated_instance {
        (
            rule.is_some_and(|r| r.is_instance_completed(occurrence.date)),
            rule.is_some_and(|r| r.is_instance_skipped(occurrence.date)),
        )
    } else {
        (task.completed, false)
    };

    CalendarEntry {
        key: occurrence.key(),
        task_id: occurrence.source_task_id,
        title: task.title.clone(),
        date: occurrence.date,
        is_generated_instance: occurrence.is_generated_instance,
        is_recurring: rule.is_some(),
        completed,
        skipped,
    }
}
