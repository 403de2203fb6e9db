use crate::domain::temporal::{self, TemporalError};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Display color tag used when an event has no color of its own.
pub const DEFAULT_EVENT_COLOR: &str = "default";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    /// Optimistically inserted; the remote store has not assigned a durable id yet.
    Pending,
    #[default]
    Confirmed,
}

/// When an event happens, in wall-clock terms. Never carries a time zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Occurrence {
    AllDay {
        date: NaiveDate,
    },
    Timed {
        start: NaiveDateTime,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<NaiveDateTime>,
    },
}

impl Occurrence {
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay { .. })
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Self::AllDay { date } => *date,
            Self::Timed { start, .. } => start.date(),
        }
    }

    /// Canonical start text: `YYYY-MM-DD` for all-day, `YYYY-MM-DDTHH:MM:SS` for timed.
    pub fn start_text(&self) -> String {
        match self {
            Self::AllDay { date } => temporal::canonical_date_text(*date),
            Self::Timed { start, .. } => temporal::canonical_datetime_text(*start),
        }
    }

    pub fn end_text(&self) -> Option<String> {
        match self {
            Self::AllDay { .. } => None,
            Self::Timed { end, .. } => end.map(temporal::canonical_datetime_text),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Placeholder while pending, durable id once confirmed, empty for
    /// mirrored events the remote store has not persisted.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub title: String,
    pub occurrence: Occurrence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(skip)]
    pub state: EventState,
}

impl CalendarEvent {
    pub fn pending(placeholder_id: impl Into<String>, draft: &EventDraft) -> Self {
        Self {
            id: placeholder_id.into(),
            external_id: None,
            title: draft.title.trim().to_string(),
            occurrence: draft.occurrence.clone(),
            description: normalize_optional(draft.description.as_deref()),
            color: normalize_color(draft.color.as_deref()),
            state: EventState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == EventState::Pending
    }

    pub fn id(&self) -> Option<&str> {
        non_empty(Some(self.id.as_str()))
    }

    pub fn external_id(&self) -> Option<&str> {
        non_empty(self.external_id.as_deref())
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "event.title")?;
        validate_occurrence(&self.occurrence, "event.occurrence")?;
        if self.id().is_none() && self.external_id().is_none() {
            return Err("event must carry an id or an externalId".to_string());
        }
        Ok(())
    }
}

/// Field values for a new event, or the edited values of an existing one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    pub occurrence: Occurrence,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl EventDraft {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "draft.title")?;
        validate_occurrence(&self.occurrence, "draft.occurrence")
    }
}

/// Raw text as submitted by an event dialog.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventForm {
    pub title: String,
    pub date: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl EventForm {
    pub fn to_draft(&self) -> Result<EventDraft, TemporalError> {
        let occurrence = temporal::combine_date_and_time(
            &self.date,
            self.start_time.as_deref(),
            self.end_time.as_deref(),
        )?;
        Ok(EventDraft {
            title: self.title.trim().to_string(),
            occurrence,
            description: self.description.clone(),
            color: self.color.clone(),
        })
    }
}

pub fn default_color() -> String {
    DEFAULT_EVENT_COLOR.to_string()
}

/// Trims the value; empty and absent are the same thing.
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    non_empty(value).map(ToOwned::to_owned)
}

pub fn normalize_color(value: Option<&str>) -> String {
    non_empty(value)
        .map(ToOwned::to_owned)
        .unwrap_or_else(default_color)
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_occurrence(occurrence: &Occurrence, field_name: &str) -> Result<(), String> {
    if let Occurrence::Timed {
        start,
        end: Some(end),
    } = occurrence
    {
        if end < start {
            return Err(format!("{field_name}.end must not be before start"));
        }
    }
    Ok(())
}
