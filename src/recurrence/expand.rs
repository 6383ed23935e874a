use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;

use crate::models::Task;
use crate::recurrence::{Pattern, Recurrence, day::utc_day};

/// A calendar appearance of a task, computed per query and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub source_task_id: String,
    pub date: NaiveDate,
    pub is_generated_instance: bool,
}

impl Occurrence {
    pub fn original(task_id: &str, date: NaiveDate) -> Self {
        Self {
            source_task_id: task_id.to_string(),
            date,
            is_generated_instance: false,
        }
    }

    pub fn generated(task_id: &str, date: NaiveDate) -> Self {
        Self {
            source_task_id: task_id.to_string(),
            date,
            is_generated_instance: true,
        }
    }

    /// Client-side identity: the template id for originals,
    /// `{templateId}_{YYYY-MM-DD}` for generated instances.
    pub fn key(&self) -> String {
        if self.is_generated_instance {
            format!("{}_{}", self.source_task_id, self.date.format("%Y-%m-%d"))
        } else {
            self.source_task_id.clone()
        }
    }
}

/// First date of the series: start date, else due date, else creation day.
pub fn anchor_date(task: &Task) -> Option<NaiveDate> {
    task.start_date
        .or(task.due_date)
        .or_else(|| Some(utc_day(task.created_at)))
}

/// Dates the task's recurrence occupies inside `[window_start, window_end]`,
/// ascending and without duplicates.
///
/// Returns an empty list for non-recurring tasks and inverted windows.
pub fn expand(task: &Task, window_start: NaiveDate, window_end: NaiveDate) -> Vec<NaiveDate> {
    let Some(rule) = task.active_recurrence() else {
        return Vec::new();
    };
    let Some(anchor) = anchor_date(task) else {
        return Vec::new();
    };
    if window_start > window_end {
        return Vec::new();
    }

    let base = match task.start_date {
        Some(start) if anchor < start => start,
        _ => anchor,
    };
    let series_end = rule.end_date.unwrap_or(NaiveDate::MAX);
    let limit = series_end.min(window_end);

    let mut dates = Vec::new();
    let mut index = first_candidate_index(base, rule, window_start);
    while let Some(cursor) = nth_occurrence(base, rule, index) {
        if cursor > limit {
            break;
        }
        if cursor >= window_start {
            dates.push(cursor);
        }
        index = match index.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }

    debug_assert!(dates.windows(2).all(|w| w[0] < w[1]));
    dates
}

/// Turns expanded dates into generated occurrences. A date on the task's own
/// due date is dropped; the caller emits that one as the original.
pub fn merge(task: &Task, generated: &[NaiveDate]) -> Vec<Occurrence> {
    generated
        .iter()
        .filter(|date| task.due_date != Some(**date))
        .map(|date| Occurrence::generated(&task.id, *date))
        .collect()
}

/// The `index`-th date of the series, counted from `base`.
///
/// Monthly and yearly steps keep `base`'s day of month and clamp it to the
/// last day of shorter months, so a 31st anchor yields Feb 28/29, Mar 31,
/// Apr 30 and a Feb 29 anchor yields Feb 28 in common years.
/// `None` once the date leaves chrono's representable range.
fn nth_occurrence(base: NaiveDate, rule: &Recurrence, index: u32) -> Option<NaiveDate> {
    let steps = rule.interval.max(1).checked_mul(index)?;
    match rule.pattern {
        Pattern::Daily => base.checked_add_days(Days::new(u64::from(steps))),
        Pattern::Weekly => base.checked_add_days(Days::new(u64::from(steps) * 7)),
        Pattern::Monthly => shift_months(base, steps),
        Pattern::Yearly => shift_months(base, steps.checked_mul(12)?),
    }
}

/// Index of the first period that can reach `window_start`. Every earlier
/// index is strictly before the window, so skipping them changes nothing.
fn first_candidate_index(base: NaiveDate, rule: &Recurrence, window_start: NaiveDate) -> u32 {
    if window_start <= base {
        return 0;
    }
    let interval = i64::from(rule.interval.max(1));
    let elapsed_periods = match rule.pattern {
        Pattern::Daily => (window_start - base).num_days() / interval,
        Pattern::Weekly => (window_start - base).num_days() / (7 * interval),
        Pattern::Monthly => months_between(base, window_start) / interval,
        Pattern::Yearly => months_between(base, window_start) / (12 * interval),
    };
    u32::try_from(elapsed_periods.max(0)).unwrap_or(u32::MAX)
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    month_ordinal(to) - month_ordinal(from)
}

fn month_ordinal(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn shift_months(base: NaiveDate, months: u32) -> Option<NaiveDate> {
    let target = month_ordinal(base) + i64::from(months);
    let year = i32::try_from(target.div_euclid(12)).ok()?;
    let month = u32::try_from(target.rem_euclid(12)).ok()? + 1;
    let day = base.day().min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = match first.checked_add_months(Months::new(1)) {
        Some(next) => next.pred_opt()?,
        // December of the last representable year
        None => NaiveDate::from_ymd_opt(year, month, 31)?,
    };
    Some(last.day())
}
