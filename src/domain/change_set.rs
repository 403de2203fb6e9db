use crate::domain::models::{normalize_color, normalize_optional, CalendarEvent, EventDraft};
use serde::{Deserialize, Serialize};

/// Minimal update body. Absent fields are left untouched by the remote store;
/// an empty string clears `description` or `end`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Wire names of the fields carried by this change-set.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("title", self.title.is_some()),
            ("description", self.description.is_some()),
            ("color", self.color.is_some()),
            ("start", self.start.is_some()),
            ("end", self.end.is_some()),
            ("allDay", self.all_day.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

pub fn build_change_set(existing: &CalendarEvent, edited: &EventDraft) -> ChangeSet {
    let mut changes = ChangeSet::default();

    let title = edited.title.trim();
    if title != existing.title.trim() {
        changes.title = Some(title.to_string());
    }

    let description = normalize_optional(edited.description.as_deref());
    if description != normalize_optional(existing.description.as_deref()) {
        changes.description = Some(description.unwrap_or_default());
    }

    let color = normalize_color(edited.color.as_deref());
    if color != normalize_color(Some(existing.color.as_str())) {
        changes.color = Some(color);
    }

    let start = edited.occurrence.start_text();
    if start != existing.occurrence.start_text() {
        changes.start = Some(start);
    }

    let end = edited.occurrence.end_text().unwrap_or_default();
    if end != existing.occurrence.end_text().unwrap_or_default() {
        changes.end = Some(end);
    }

    if edited.occurrence.is_all_day() != existing.occurrence.is_all_day() {
        changes.all_day = Some(edited.occurrence.is_all_day());
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EventForm, EventState, Occurrence, DEFAULT_EVENT_COLOR};
    use crate::domain::temporal::combine_date_and_time;

    fn existing() -> CalendarEvent {
        CalendarEvent {
            id: "7".to_string(),
            external_id: None,
            title: "Leg day".to_string(),
            occurrence: combine_date_and_time("2025-03-10", Some("07:00"), Some("08:30"))
                .expect("valid occurrence"),
            description: None,
            color: DEFAULT_EVENT_COLOR.to_string(),
            state: EventState::Confirmed,
        }
    }

    fn unchanged_form() -> EventForm {
        EventForm {
            title: "Leg day".to_string(),
            date: "2025-03-10".to_string(),
            start_time: Some("07:00".to_string()),
            end_time: Some("08:30".to_string()),
            description: Some(String::new()),
            color: None,
        }
    }

    #[test]
    fn unchanged_form_produces_empty_change_set() {
        let draft = unchanged_form().to_draft().expect("valid form");
        let changes = build_change_set(&existing(), &draft);

        assert!(changes.is_empty());
        let body = serde_json::to_value(&changes).expect("serialize change set");
        assert_eq!(body, serde_json::json!({}));
    }

    #[test]
    fn title_only_edit_carries_only_title() {
        let mut form = unchanged_form();
        form.title = "  Leg day (heavy)  ".to_string();
        let changes = build_change_set(&existing(), &form.to_draft().expect("valid form"));

        assert_eq!(changes.changed_fields(), vec!["title"]);
        let body = serde_json::to_value(&changes).expect("serialize change set");
        assert_eq!(body, serde_json::json!({ "title": "Leg day (heavy)" }));
    }

    #[test]
    fn whitespace_only_title_difference_is_ignored() {
        let mut form = unchanged_form();
        form.title = " Leg day ".to_string();
        assert!(build_change_set(&existing(), &form.to_draft().expect("valid form")).is_empty());
    }

    #[test]
    fn clearing_description_sends_empty_string() {
        let mut event = existing();
        event.description = Some("squats".to_string());
        let changes = build_change_set(&event, &unchanged_form().to_draft().expect("valid form"));

        assert_eq!(changes.changed_fields(), vec!["description"]);
        assert_eq!(changes.description.as_deref(), Some(""));
    }

    #[test]
    fn unset_color_matches_sentinel() {
        let mut form = unchanged_form();
        form.color = Some("   ".to_string());
        assert!(build_change_set(&existing(), &form.to_draft().expect("valid form")).is_empty());

        form.color = Some("#22aa22".to_string());
        let changes = build_change_set(&existing(), &form.to_draft().expect("valid form"));
        assert_eq!(changes.changed_fields(), vec!["color"]);
    }

    #[test]
    fn moving_start_without_end_synthesizes_new_end() {
        let mut form = unchanged_form();
        form.start_time = Some("09:00".to_string());
        form.end_time = None;
        let changes = build_change_set(&existing(), &form.to_draft().expect("valid form"));

        assert_eq!(changes.start.as_deref(), Some("2025-03-10T09:00:00"));
        assert_eq!(changes.end.as_deref(), Some("2025-03-10T10:00:00"));
        assert_eq!(changes.all_day, None);
    }

    #[test]
    fn switching_to_all_day_clears_end() {
        let mut form = unchanged_form();
        form.start_time = None;
        form.end_time = None;
        let draft = form.to_draft().expect("valid form");
        assert!(matches!(draft.occurrence, Occurrence::AllDay { .. }));

        let changes = build_change_set(&existing(), &draft);
        assert_eq!(changes.changed_fields(), vec!["start", "end", "allDay"]);
        assert_eq!(changes.start.as_deref(), Some("2025-03-10"));
        assert_eq!(changes.end.as_deref(), Some(""));
        assert_eq!(changes.all_day, Some(true));
    }
}
