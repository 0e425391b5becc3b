use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::errors::AppError;

/// Storage format for every datetime column. Lexicographic order matches
/// chronological order, so range predicates compare TEXT directly.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

pub fn now() -> NaiveDateTime {
    // Truncate to whole seconds so values survive a storage round trip.
    parse_dt(&fmt_dt(&Utc::now().naive_utc()))
}

/// UTC boundaries of one calendar day.
///
/// `next_day` is the exclusive upper bound every new filter must use;
/// `end_of_day` (23:59:59.999) is kept only for compatibility with callers
/// that still expect an inclusive bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub start: NaiveDateTime,
    pub next_day: NaiveDateTime,
    pub end_of_day: NaiveDateTime,
}

/// Parses a `YYYY-MM-DD` input into day boundaries. A trailing time component
/// (after `T` or a space) is discarded. Returns `None` for empty, malformed,
/// or out-of-range input (year outside 1900..=2100); callers treat `None` as
/// "no date filter applies" unless a date is semantically required.
pub fn day_bounds(input: &str) -> Option<DayBounds> {
    let raw = input.trim();
    if raw.is_empty() {
        return None;
    }

    let date_part = raw
        .split(|c: char| c == 'T' || c == ' ')
        .next()
        .unwrap_or(raw);
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    if !(1900..=2100).contains(&date.year()) {
        return None;
    }

    let start = date.and_hms_opt(0, 0, 0)?;
    Some(DayBounds {
        start,
        next_day: start + Duration::days(1),
        end_of_day: date.and_hms_milli_opt(23, 59, 59, 999)?,
    })
}

/// Same parse, but for contexts where a date is mandatory (slot creation,
/// recurring booking ranges): a missing or invalid value is a validation
/// failure instead of "no filter".
pub fn required_day(input: &str, field: &str) -> Result<NaiveDateTime, AppError> {
    day_bounds(input)
        .map(|b| b.start)
        .ok_or_else(|| AppError::Validation(format!("{field} must be a valid date (YYYY-MM-DD)")))
}

/// Weekday as the store encodes it: 0 = Sunday .. 6 = Saturday.
pub fn day_of_week(date: &NaiveDateTime) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}
