//! Field validation shared by the user-facing and invoked surfaces.
//!
//! Everything here rejects before any write happens; the error messages are
//! what callers see in 400 bodies.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::error::CommandError;
use crate::model::Frequency;

pub const TITLE_MAX: usize = 500;
pub const DESCRIPTION_MAX: usize = 5000;

static DUE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("due date pattern"));
static DUE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}$").expect("due time pattern"));

pub fn title(raw: &str) -> Result<String, CommandError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CommandError::Validation("Title cannot be empty".to_owned()));
    }
    if trimmed.chars().count() > TITLE_MAX {
        return Err(CommandError::Validation(format!(
            "Title must be at most {TITLE_MAX} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

pub fn description(raw: Option<&str>) -> Result<Option<String>, CommandError> {
    match raw {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.chars().count() > DESCRIPTION_MAX {
                return Err(CommandError::Validation(format!(
                    "Description must be at most {DESCRIPTION_MAX} characters"
                )));
            }
            Ok(if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            })
        }
    }
}

/// `YYYY-MM-DD`, zero-padded, and a real calendar date.
pub fn due_date(raw: &str) -> Result<NaiveDate, CommandError> {
    if !DUE_DATE_RE.is_match(raw) {
        return Err(CommandError::Validation(
            "due_date must be in YYYY-MM-DD format".to_owned(),
        ));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| CommandError::Validation(format!("due_date '{raw}' is not a valid date")))
}

/// `HH:MM`, 24-hour clock, 00:00 through 23:59.
pub fn due_time(raw: &str) -> Result<String, CommandError> {
    if !DUE_TIME_RE.is_match(raw) {
        return Err(CommandError::Validation(
            "due_time must be in HH:MM format (e.g. '14:30')".to_owned(),
        ));
    }
    let hours: u32 = raw[..2].parse().unwrap_or(24);
    let minutes: u32 = raw[3..5].parse().unwrap_or(60);
    if hours > 23 || minutes > 59 {
        return Err(CommandError::Validation(
            "due_time must be a valid time (00:00-23:59)".to_owned(),
        ));
    }
    Ok(raw.to_owned())
}

pub fn frequency(raw: &str) -> Result<Frequency, CommandError> {
    match raw {
        "daily" => Ok(Frequency::Daily),
        "weekly" => Ok(Frequency::Weekly),
        "monthly" => Ok(Frequency::Monthly),
        _ => Err(CommandError::Validation(
            "Invalid frequency. Must be daily, weekly, or monthly".to_owned(),
        )),
    }
}

pub fn end_after_count(count: i64) -> Result<i64, CommandError> {
    if count < 1 {
        return Err(CommandError::Validation(
            "end_after_count must be at least 1".to_owned(),
        ));
    }
    Ok(count)
}

/// RFC 3339 timestamp, normalized to UTC.
pub fn timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, CommandError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CommandError::Validation(format!("{field} must be an RFC 3339 timestamp")))
}
