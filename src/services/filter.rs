use rusqlite::types::Value;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Slot, SlotStatus, SlotType};
use crate::services::dates;

/// The recognized slot filter options. Unknown fields are rejected at the
/// JSON boundary; an entirely empty filter matches every slot.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SlotFilter {
    pub room_id: Option<String>,
    pub room_ids: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub kind: Option<SlotType>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub service_name: Option<String>,
    pub provider_name: Option<String>,
    pub date: Option<String>,
    pub date_range_start: Option<String>,
    pub date_range_end: Option<String>,
    pub days_of_week: Option<Vec<u8>>,
    pub time_ranges: Option<Vec<String>>,
    pub status: Option<SlotStatus>,
}

impl SlotFilter {
    pub fn is_empty(&self) -> bool {
        self.room_id.is_none()
            && self.room_ids.as_ref().map_or(true, |v| v.is_empty())
            && self.kind.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.service_name.is_none()
            && self.provider_name.is_none()
            && self.date.is_none()
            && self.date_range_start.is_none()
            && self.date_range_end.is_none()
            && self.days_of_week.as_ref().map_or(true, |v| v.is_empty())
            && self.time_ranges.as_ref().map_or(true, |v| v.is_empty())
            && self.status.is_none()
    }

    /// Resolves the filter into a store-level predicate plus the in-memory
    /// post-filters, applied in fixed order: primary filter, then daysOfWeek,
    /// then timeRanges.
    ///
    /// Precedence: roomIds beats roomId; a date range (either end) beats the
    /// single date; unparseable date inputs drop that criterion rather than
    /// failing the whole filter.
    pub fn compile(&self) -> Result<CompiledFilter, AppError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        match (&self.room_ids, &self.room_id) {
            (Some(ids), _) if !ids.is_empty() => {
                let marks = vec!["?"; ids.len()].join(", ");
                clauses.push(format!("room_id IN ({marks})"));
                params.extend(ids.iter().map(|id| Value::Text(id.clone())));
            }
            (_, Some(id)) => {
                clauses.push("room_id = ?".to_string());
                params.push(Value::Text(id.clone()));
            }
            _ => {}
        }

        if let Some(kind) = self.kind {
            clauses.push("type = ?".to_string());
            params.push(Value::Text(kind.as_str().to_string()));
        }
        if let Some(t) = &self.start_time {
            clauses.push("start_time = ?".to_string());
            params.push(Value::Text(t.clone()));
        }
        if let Some(t) = &self.end_time {
            clauses.push("end_time = ?".to_string());
            params.push(Value::Text(t.clone()));
        }
        if let Some(status) = self.status {
            clauses.push("status = ?".to_string());
            params.push(Value::Text(status.as_str().to_string()));
        }

        for (column, needle) in [
            ("service_name", &self.service_name),
            ("provider_name", &self.provider_name),
        ] {
            if let Some(needle) = needle {
                if !needle.is_empty() {
                    clauses.push(format!("{column} LIKE ? ESCAPE '\\'"));
                    params.push(Value::Text(format!("%{}%", like_escape(needle))));
                }
            }
        }

        let range_start = self.date_range_start.as_deref().and_then(dates::day_bounds);
        let range_end = self.date_range_end.as_deref().and_then(dates::day_bounds);
        match (range_start, range_end) {
            (Some(start), Some(end)) => {
                clauses.push("date >= ?".to_string());
                params.push(Value::Text(dates::fmt_dt(&start.start)));
                clauses.push("date < ?".to_string());
                params.push(Value::Text(dates::fmt_dt(&end.next_day)));
            }
            (Some(start), None) => {
                clauses.push("date >= ?".to_string());
                params.push(Value::Text(dates::fmt_dt(&start.start)));
            }
            (None, Some(end)) => {
                clauses.push("date < ?".to_string());
                params.push(Value::Text(dates::fmt_dt(&end.next_day)));
            }
            (None, None) => {
                if let Some(day) = self.date.as_deref().and_then(dates::day_bounds) {
                    clauses.push("date >= ?".to_string());
                    params.push(Value::Text(dates::fmt_dt(&day.start)));
                    clauses.push("date < ?".to_string());
                    params.push(Value::Text(dates::fmt_dt(&day.next_day)));
                }
            }
        }

        let days_of_week = self.days_of_week.clone().unwrap_or_default();
        if let Some(bad) = days_of_week.iter().find(|d| **d > 6) {
            return Err(AppError::Validation(format!(
                "daysOfWeek values must be between 0 (Sunday) and 6 (Saturday), got {bad}"
            )));
        }

        let mut time_ranges = Vec::new();
        for raw in self.time_ranges.iter().flatten() {
            time_ranges.push(TimeRange::parse(raw)?);
        }

        Ok(CompiledFilter {
            clauses,
            params,
            days_of_week,
            time_ranges,
        })
    }
}

/// A half-open `HH:MM` window: a slot matches when its start time falls in
/// `[start, end)`. Zero-padded times compare correctly as strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let malformed =
            || AppError::Validation(format!("timeRanges entries must be HH:MM-HH:MM, got '{raw}'"));

        let (start, end) = raw.split_once('-').ok_or_else(malformed)?;
        if !is_padded_time(start) || !is_padded_time(end) {
            return Err(malformed());
        }
        Ok(Self {
            start: start.to_string(),
            end: end.to_string(),
        })
    }

    pub fn contains(&self, time: &str) -> bool {
        self.start.as_str() <= time && time < self.end.as_str()
    }
}

/// Zero-padded 24h `HH:MM`. The engine relies on this shape so time strings
/// compare correctly lexicographically.
pub fn is_valid_time(s: &str) -> bool {
    is_padded_time(s)
}

fn is_padded_time(s: &str) -> bool {
    let Some((hour, minute)) = s.split_once(':') else {
        return false;
    };
    if hour.len() != 2 || minute.len() != 2 {
        return false;
    }
    let (Ok(h), Ok(m)) = (hour.parse::<u32>(), minute.parse::<u32>()) else {
        return false;
    };
    h <= 23 && m <= 59
}

fn like_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Output of `SlotFilter::compile`: the SQL predicate for the store query and
/// the closures that must run in memory afterwards.
#[derive(Debug)]
pub struct CompiledFilter {
    clauses: Vec<String>,
    params: Vec<Value>,
    days_of_week: Vec<u8>,
    time_ranges: Vec<TimeRange>,
}

impl CompiledFilter {
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn matches_post_filters(&self, slot: &Slot) -> bool {
        if !self.days_of_week.is_empty()
            && !self.days_of_week.contains(&dates::day_of_week(&slot.date))
        {
            return false;
        }
        if !self.time_ranges.is_empty()
            && !self.time_ranges.iter().any(|r| r.contains(&slot.start_time))
        {
            return false;
        }
        true
    }

    pub fn apply_post_filters(&self, slots: Vec<Slot>) -> Vec<Slot> {
        slots
            .into_iter()
            .filter(|s| self.matches_post_filters(s))
            .collect()
    }
}
