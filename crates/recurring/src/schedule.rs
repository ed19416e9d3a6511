//! Due-date arithmetic for generated occurrences.

use chrono::{Days, Months, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Unknown values fall back to daily, matching the tolerant behavior
    /// consumers need for forward-compatible rule payloads.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "weekly" => Frequency::Weekly,
            "monthly" => Frequency::Monthly,
            "daily" => Frequency::Daily,
            other => {
                tracing::warn!(frequency = other, "unknown frequency, defaulting to daily");
                Frequency::Daily
            }
        }
    }
}

/// Advance a due date by one frequency step. Monthly arithmetic is
/// calendar-aware: when the target month is shorter than the source day the
/// date clamps to the last day of the target month.
pub fn next_due_date(current: NaiveDate, frequency: Frequency) -> NaiveDate {
    match frequency {
        Frequency::Daily => current.checked_add_days(Days::new(1)).unwrap_or(current),
        Frequency::Weekly => current.checked_add_days(Days::new(7)).unwrap_or(current),
        Frequency::Monthly => current
            .checked_add_months(Months::new(1))
            .unwrap_or(current),
    }
}

/// Rules and events carry due dates either as a bare `YYYY-MM-DD` or as a
/// full timestamp; take the date part of whichever shows up.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}
