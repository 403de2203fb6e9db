//! Wall-clock parsing and formatting for event occurrences.
//!
//! Text without an offset marker is always read as local wall-clock time.
//! Only text that carries an explicit offset (or `Z`) is parsed as an
//! instant, and it is immediately converted into the configured display
//! time zone so the stored value is wall-clock again.

use crate::domain::models::Occurrence;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const NAIVE_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const OFFSET_DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%dT%H:%M:%S%:z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M%z",
];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];
const SYNTHESIZED_DURATION_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed temporal input '{input}': {reason}")]
pub struct TemporalError {
    pub input: String,
    pub reason: String,
}

impl TemporalError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStyle {
    /// `Monday, March 10, 2025` and `7:00 AM - 8:00 AM`.
    #[default]
    Long,
    /// `2025-03-10` and `07:00 - 08:00`.
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayText {
    pub date: String,
    /// Only present for timed occurrences.
    pub time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalNormalizer {
    time_zone: Tz,
}

impl Default for TemporalNormalizer {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl TemporalNormalizer {
    pub fn new(time_zone: Tz) -> Self {
        Self { time_zone }
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn parse_occurrence(&self, text: &str) -> Result<Occurrence, TemporalError> {
        match self.parse_wall_clock(text)? {
            WallClock::Date(date) => Ok(Occurrence::AllDay { date }),
            WallClock::DateTime(start) => Ok(Occurrence::Timed { start, end: None }),
        }
    }

    /// Parses the end of a timed occurrence. A bare date is not a valid end.
    pub fn parse_end(&self, text: &str) -> Result<NaiveDateTime, TemporalError> {
        match self.parse_wall_clock(text)? {
            WallClock::DateTime(end) => Ok(end),
            WallClock::Date(_) => Err(TemporalError::new(
                text,
                "end of a timed event needs a time of day",
            )),
        }
    }

    fn parse_wall_clock(&self, text: &str) -> Result<WallClock, TemporalError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(TemporalError::new(text, "empty value"));
        }

        if has_date_shape(trimmed) {
            return NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(WallClock::Date)
                .map_err(|error| TemporalError::new(text, error.to_string()));
        }

        if let Some(parsed) = NAIVE_DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        {
            return Ok(WallClock::DateTime(truncate_to_seconds(parsed)));
        }

        if let Some(instant) = parse_with_offset(trimmed) {
            let local = instant.with_timezone(&self.time_zone).naive_local();
            return Ok(WallClock::DateTime(truncate_to_seconds(local)));
        }

        Err(TemporalError::new(
            text,
            "expected YYYY-MM-DD, a local date-time, or a date-time with an explicit offset",
        ))
    }
}

enum WallClock {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

pub fn canonical_date_text(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn canonical_datetime_text(value: NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Builds an occurrence from dialog fields.
///
/// Without a start time the result is all-day. Without an end time the end is
/// synthesized one hour after the start in wall-clock arithmetic. An end that
/// is earlier than the start is taken to be on the following day.
pub fn combine_date_and_time(
    date: &str,
    start_time: Option<&str>,
    end_time: Option<&str>,
) -> Result<Occurrence, TemporalError> {
    let trimmed_date = date.trim();
    if !has_date_shape(trimmed_date) {
        return Err(TemporalError::new(date, "date must be YYYY-MM-DD"));
    }
    let day = NaiveDate::parse_from_str(trimmed_date, DATE_FORMAT)
        .map_err(|error| TemporalError::new(date, error.to_string()))?;

    let Some(start_time) = start_time.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(Occurrence::AllDay { date: day });
    };
    let start = day.and_time(parse_time_of_day(start_time)?);

    let end = match end_time.map(str::trim).filter(|value| !value.is_empty()) {
        Some(end_time) => {
            let end = day.and_time(parse_time_of_day(end_time)?);
            if end < start {
                end + Duration::days(1)
            } else {
                end
            }
        }
        None => synthesize_end(start),
    };

    Ok(Occurrence::Timed {
        start,
        end: Some(end),
    })
}

pub fn format_for_display(occurrence: &Occurrence, style: DisplayStyle) -> DisplayText {
    let (date_format, time_format, dated_time_format) = match style {
        DisplayStyle::Long => ("%A, %B %-d, %Y", "%-I:%M %p", "%b %-d, %-I:%M %p"),
        DisplayStyle::Compact => ("%Y-%m-%d", "%H:%M", "%Y-%m-%d %H:%M"),
    };

    match occurrence {
        Occurrence::AllDay { date } => DisplayText {
            date: date.format(date_format).to_string(),
            time: None,
        },
        Occurrence::Timed { start, end } => {
            let start_text = start.format(time_format).to_string();
            let time = match end {
                Some(end) if end.date() == start.date() => {
                    format!("{start_text} - {}", end.format(time_format))
                }
                Some(end) => format!("{start_text} - {}", end.format(dated_time_format)),
                None => start_text,
            };
            DisplayText {
                date: start.date().format(date_format).to_string(),
                time: Some(time),
            }
        }
    }
}

fn synthesize_end(start: NaiveDateTime) -> NaiveDateTime {
    truncate_to_seconds(start) + Duration::minutes(SYNTHESIZED_DURATION_MINUTES)
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime, TemporalError> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
        .ok_or_else(|| TemporalError::new(value, "time must be HH:MM or HH:MM:SS"))
}

fn parse_with_offset(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }
    let with_numeric_offset = match value.strip_suffix(['Z', 'z']) {
        Some(prefix) => format!("{prefix}+00:00"),
        None => value.to_string(),
    };
    OFFSET_DATETIME_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(&with_numeric_offset, format).ok())
}

fn has_date_shape(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

fn truncate_to_seconds(value: NaiveDateTime) -> NaiveDateTime {
    value.with_nanosecond(0).unwrap_or(value)
}
