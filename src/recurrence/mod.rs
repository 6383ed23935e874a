//! Recurring-task expansion.
//!
//! Everything in this module is pure: it reads a [`Task`](crate::models::Task)
//! and computes dates, or mutates a [`Recurrence`] value the caller owns.
//! Persisting the result is the store's job.

pub mod day;
pub mod expand;
pub mod rule;

pub use day::parse_calendar_day;
pub use expand::{Occurrence, anchor_date, expand, merge};
pub use rule::{CompletedDate, Pattern, Recurrence, RecurrenceInput, SkippedDate, coerce_interval};
