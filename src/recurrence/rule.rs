use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::nullable;

/// Repetition period of a recurring task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Pattern {
    /// Parses a stored or client-supplied pattern name.
    ///
    /// Missing or unrecognized names fall back to `Daily`.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("weekly") => Pattern::Weekly,
            Some("monthly") => Pattern::Monthly,
            Some("yearly") => Pattern::Yearly,
            _ => Pattern::Daily,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::Daily => "daily",
            Pattern::Weekly => "weekly",
            Pattern::Monthly => "monthly",
            Pattern::Yearly => "yearly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedDate {
    pub date: NaiveDate,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub skipped_at: DateTime<Utc>,
    pub reason: String,
}

/// Fully defaulted repetition rule plus its per-instance bookkeeping.
///
/// Built through [`RecurrenceInput::normalize`] or [`Recurrence::from_stored`],
/// so `interval` is never zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recurrence {
    pub is_recurring: bool,
    pub pattern: Pattern,
    pub interval: u32,
    pub end_date: Option<NaiveDate>,
    pub completed_instances: u32,
    pub completed_dates: Vec<CompletedDate>,
    pub skipped_dates: Vec<SkippedDate>,
}

/// Coerces a raw interval to the `>= 1` range.
pub fn coerce_interval(raw: Option<i64>) -> u32 {
    match raw {
        Some(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => 1,
    }
}

impl Recurrence {
    pub fn new(pattern: Pattern, interval: u32) -> Self {
        Self {
            is_recurring: true,
            pattern,
            interval: interval.max(1),
            end_date: None,
            completed_instances: 0,
            completed_dates: Vec::new(),
            skipped_dates: Vec::new(),
        }
    }

    /// Rebuilds a rule from the columns persisted in the `tasks` table.
    pub fn from_stored(
        is_recurring: bool,
        pattern: Option<&str>,
        interval: Option<i64>,
        end_date: Option<NaiveDate>,
        completed_instances: i64,
    ) -> Self {
        Self {
            is_recurring,
            pattern: Pattern::parse_lenient(pattern),
            interval: coerce_interval(interval),
            end_date,
            completed_instances: u32::try_from(completed_instances.max(0)).unwrap_or(u32::MAX),
            completed_dates: Vec::new(),
            skipped_dates: Vec::new(),
        }
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Records a completed instance. Completing the same date twice appends
    /// twice; `completed == false` leaves the state untouched.
    pub fn mark_instance_completed(
        &mut self,
        instance_date: NaiveDate,
        completed: bool,
        at: DateTime<Utc>,
    ) {
        if !completed {
            return;
        }
        self.completed_instances = self.completed_instances.saturating_add(1);
        self.completed_dates.push(CompletedDate {
            date: instance_date,
            completed_at: at,
        });
    }

    /// Appends a skip record. Skips are annotations only and never remove a
    /// date from expansion.
    pub fn mark_instance_skipped(
        &mut self,
        instance_date: NaiveDate,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        self.skipped_dates.push(SkippedDate {
            date: instance_date,
            skipped_at: at,
            reason: reason.into(),
        });
    }

    pub fn is_instance_completed(&self, date: NaiveDate) -> bool {
        self.completed_dates.iter().any(|c| c.date == date)
    }

    pub fn is_instance_skipped(&self, date: NaiveDate) -> bool {
        self.skipped_dates.iter().any(|s| s.date == date)
    }
}

/// Recurrence as it arrives from clients: every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceInput {
    pub is_recurring: Option<bool>,
    pub pattern: Option<String>,
    pub interval: Option<i64>,
    /// `null` clears the end date when patching an existing rule.
    #[serde(default, deserialize_with = "nullable::deserialize", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<NaiveDate>>,
}

impl RecurrenceInput {
    pub fn normalize(self) -> Recurrence {
        Recurrence {
            is_recurring: self.is_recurring.unwrap_or(true),
            pattern: Pattern::parse_lenient(self.pattern.as_deref()),
            interval: coerce_interval(self.interval),
            end_date: self.end_date.flatten(),
            completed_instances: 0,
            completed_dates: Vec::new(),
            skipped_dates: Vec::new(),
        }
    }

    /// Applies the supplied fields onto an existing rule, keeping its
    /// completion and skip history.
    pub fn apply_to(self, existing: Recurrence) -> Recurrence {
        Recurrence {
            is_recurring: self.is_recurring.unwrap_or(existing.is_recurring),
            pattern: match self.pattern.as_deref() {
                Some(p) => Pattern::parse_lenient(Some(p)),
                None => existing.pattern,
            },
            interval: match self.interval {
                Some(_) => coerce_interval(self.interval),
                None => existing.interval,
            },
            end_date: nullable::apply(self.end_date, existing.end_date),
            ..existing
        }
    }
}
