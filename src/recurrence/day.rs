use chrono::{DateTime, NaiveDate, Utc};

/// Reads a calendar day from either `YYYY-MM-DD` or an RFC 3339 timestamp.
///
/// Timestamps are converted to UTC before truncation so every caller agrees
/// on which day an instant belongs to.
pub fn parse_calendar_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(day);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| utc_day(dt.with_timezone(&Utc)))
}

pub fn utc_day(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}
