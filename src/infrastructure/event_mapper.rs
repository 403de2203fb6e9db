use crate::domain::change_set::ChangeSet;
use crate::domain::models::{
    non_empty, normalize_color, normalize_optional, CalendarEvent, EventDraft, EventState,
    Occurrence,
};
use crate::domain::temporal::TemporalNormalizer;
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

const KEYS_ID: &[&str] = &["id"];
const KEYS_EXTERNAL_ID: &[&str] = &["externalId", "googleEventId"];
const KEYS_TITLE: &[&str] = &["title", "summary"];
const KEYS_DESCRIPTION: &[&str] = &["description"];
const KEYS_COLOR: &[&str] = &["color"];
const KEYS_START: &[&str] = &["start"];
const KEYS_END: &[&str] = &["end"];
const KEYS_ALL_DAY: &[&str] = &["allDay"];

/// Event as the remote store and the external provider send it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEventRecord {
    #[serde(default, deserialize_with = "optional_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        alias = "googleEventId",
        deserialize_with = "optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub external_id: Option<String>,
    #[serde(default, alias = "summary", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Create request body.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEventPayload {
    pub title: String,
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    pub all_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateMerge {
    Unchanged,
    Merged(CalendarEvent),
}

pub fn encode_draft(draft: &EventDraft) -> RemoteEventPayload {
    RemoteEventPayload {
        title: draft.title.trim().to_string(),
        start: draft.occurrence.start_text(),
        end: draft.occurrence.end_text(),
        all_day: draft.occurrence.is_all_day(),
        description: normalize_optional(draft.description.as_deref()),
        color: normalize_color(draft.color.as_deref()),
    }
}

pub fn decode_remote_event(
    record: &RemoteEventRecord,
    normalizer: &TemporalNormalizer,
) -> Result<CalendarEvent, InfraError> {
    let id = non_empty(record.id.as_deref()).unwrap_or_default().to_string();
    let external_id = normalize_optional(record.external_id.as_deref());
    if id.is_empty() && external_id.is_none() {
        return Err(InfraError::InvalidRecord(
            "event record has neither id nor externalId".to_string(),
        ));
    }

    let title = non_empty(record.title.as_deref())
        .ok_or_else(|| InfraError::InvalidRecord(format!("event '{id}' has no title")))?
        .to_string();
    let start = non_empty(record.start.as_deref())
        .ok_or_else(|| InfraError::InvalidRecord(format!("event '{id}' has no start")))?;
    let occurrence = decode_occurrence(start, record.end.as_deref(), record.all_day, normalizer)?;

    Ok(CalendarEvent {
        id,
        external_id,
        title,
        occurrence,
        description: normalize_optional(record.description.as_deref()),
        color: normalize_color(record.color.as_deref()),
        state: EventState::Confirmed,
    })
}

/// Decodes a create response; the record must carry the durable id.
pub fn decode_created_event(
    body: &Value,
    normalizer: &TemporalNormalizer,
) -> Result<CalendarEvent, InfraError> {
    let record: RemoteEventRecord = serde_json::from_value(body.clone())?;
    if non_empty(record.id.as_deref()).is_none() {
        return Err(InfraError::InvalidRecord(
            "create response did not include id".to_string(),
        ));
    }
    decode_remote_event(&record, normalizer)
}

/// Folds an update response into the current record.
///
/// The response must either carry every changed field or be a full record
/// (`id`, `title` and `start`). Only the fields present in the response are
/// written; everything else on `current` is kept.
pub fn merge_update_response(
    current: &CalendarEvent,
    body: &Value,
    changes: &ChangeSet,
    normalizer: &TemporalNormalizer,
) -> Result<UpdateMerge, InfraError> {
    if is_empty_body(body) {
        if changes.is_empty() {
            return Ok(UpdateMerge::Unchanged);
        }
        return Err(InfraError::InvalidRecord(format!(
            "update response is empty but fields changed: {}",
            changes.changed_fields().join(", ")
        )));
    }

    let Value::Object(fields) = body else {
        return Err(InfraError::InvalidRecord(format!(
            "update response is not an object: {body}"
        )));
    };

    let is_full_record = [KEYS_ID, KEYS_TITLE, KEYS_START]
        .iter()
        .all(|keys| has_any(fields, keys));
    let missing: Vec<&str> = changes
        .changed_fields()
        .into_iter()
        .filter(|field| !has_any(fields, keys_for(field)))
        .collect();
    if !is_full_record && !missing.is_empty() {
        return Err(InfraError::InvalidRecord(format!(
            "update response is missing changed fields: {}",
            missing.join(", ")
        )));
    }

    let record: RemoteEventRecord = serde_json::from_value(body.clone())?;
    let mut merged = current.clone();

    if let Some(id) = non_empty(record.id.as_deref()) {
        merged.id = id.to_string();
    }
    if has_any(fields, KEYS_EXTERNAL_ID) {
        merged.external_id = normalize_optional(record.external_id.as_deref());
    }
    if let Some(title) = non_empty(record.title.as_deref()) {
        merged.title = title.to_string();
    }
    if has_any(fields, KEYS_DESCRIPTION) {
        merged.description = normalize_optional(record.description.as_deref());
    }
    if has_any(fields, KEYS_COLOR) {
        merged.color = normalize_color(record.color.as_deref());
    }
    if has_any(fields, KEYS_START) || has_any(fields, KEYS_END) || has_any(fields, KEYS_ALL_DAY) {
        merged.occurrence = merge_occurrence(current, fields, &record, normalizer)?;
    }

    if merged == *current {
        Ok(UpdateMerge::Unchanged)
    } else {
        Ok(UpdateMerge::Merged(merged))
    }
}

fn merge_occurrence(
    current: &CalendarEvent,
    fields: &Map<String, Value>,
    record: &RemoteEventRecord,
    normalizer: &TemporalNormalizer,
) -> Result<Occurrence, InfraError> {
    let start = non_empty(record.start.as_deref())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| current.occurrence.start_text());
    let end = if has_any(fields, KEYS_END) {
        record.end.clone()
    } else {
        current.occurrence.end_text()
    };
    let all_day = if has_any(fields, KEYS_ALL_DAY) {
        record.all_day
    } else if has_any(fields, KEYS_START) {
        None
    } else {
        Some(current.occurrence.is_all_day())
    };
    decode_occurrence(&start, end.as_deref(), all_day, normalizer)
}

fn decode_occurrence(
    start: &str,
    end: Option<&str>,
    all_day: Option<bool>,
    normalizer: &TemporalNormalizer,
) -> Result<Occurrence, InfraError> {
    let occurrence = normalizer.parse_occurrence(start)?;
    if all_day == Some(true) {
        return Ok(Occurrence::AllDay {
            date: occurrence.date(),
        });
    }

    match occurrence {
        Occurrence::AllDay { date } => Ok(Occurrence::AllDay { date }),
        Occurrence::Timed { start, .. } => {
            let end = non_empty(end)
                .map(|value| normalizer.parse_end(value))
                .transpose()?;
            if end.is_some_and(|end| end < start) {
                return Err(InfraError::InvalidRecord(format!(
                    "event ends before it starts: {start}"
                )));
            }
            Ok(Occurrence::Timed { start, end })
        }
    }
}

fn keys_for(field: &str) -> &'static [&'static str] {
    match field {
        "title" => KEYS_TITLE,
        "description" => KEYS_DESCRIPTION,
        "color" => KEYS_COLOR,
        "start" => KEYS_START,
        "end" => KEYS_END,
        "allDay" => KEYS_ALL_DAY,
        _ => KEYS_ID,
    }
}

fn has_any(fields: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|key| fields.contains_key(*key))
}

fn is_empty_body(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EventForm, DEFAULT_EVENT_COLOR};
    use serde_json::json;

    fn normalizer() -> TemporalNormalizer {
        TemporalNormalizer::default()
    }

    fn record(value: Value) -> RemoteEventRecord {
        serde_json::from_value(value).expect("valid record")
    }

    fn confirmed_event() -> CalendarEvent {
        decode_remote_event(
            &record(json!({
                "id": 7,
                "title": "Leg day",
                "start": "2025-03-10T07:00:00",
                "end": "2025-03-10T08:00:00",
                "description": "squats",
                "color": "#ff0000"
            })),
            &normalizer(),
        )
        .expect("decode event")
    }

    #[test]
    fn decode_accepts_numeric_ids_and_aliases() {
        let event = decode_remote_event(
            &record(json!({
                "id": 42,
                "googleEventId": "g1",
                "summary": "Spin class",
                "start": "2025-03-10T18:00",
            })),
            &normalizer(),
        )
        .expect("decode event");

        assert_eq!(event.id, "42");
        assert_eq!(event.external_id.as_deref(), Some("g1"));
        assert_eq!(event.title, "Spin class");
        assert_eq!(event.occurrence.start_text(), "2025-03-10T18:00:00");
        assert_eq!(event.color, DEFAULT_EVENT_COLOR);
        assert_eq!(event.state, EventState::Confirmed);
    }

    #[test]
    fn decode_mirrored_event_without_local_id() {
        let event = decode_remote_event(
            &record(json!({
                "externalId": "g1",
                "title": "Team offsite",
                "start": "2025-03-12",
                "end": "2025-03-13",
                "allDay": true
            })),
            &normalizer(),
        )
        .expect("decode mirrored event");

        assert_eq!(event.id, "");
        assert!(event.occurrence.is_all_day());
        assert_eq!(event.occurrence.end_text(), None);
    }

    #[test]
    fn decode_all_day_flag_drops_time_of_day() {
        let event = decode_remote_event(
            &record(json!({
                "id": "9",
                "title": "Rest",
                "start": "2025-03-12T00:00:00",
                "allDay": true
            })),
            &normalizer(),
        )
        .expect("decode event");
        assert_eq!(event.occurrence.start_text(), "2025-03-12");
    }

    #[test]
    fn decode_rejects_incomplete_records() {
        let cases = [
            json!({ "title": "No ids", "start": "2025-03-10" }),
            json!({ "id": "1", "start": "2025-03-10" }),
            json!({ "id": "1", "title": "No start" }),
            json!({ "id": "1", "title": "Bad start", "start": "March 10" }),
            json!({ "id": "1", "title": "Reversed", "start": "2025-03-10T09:00", "end": "2025-03-10T08:00" }),
        ];
        for case in cases {
            assert!(
                decode_remote_event(&record(case.clone()), &normalizer()).is_err(),
                "expected {case} to be rejected"
            );
        }
    }

    #[test]
    fn encode_draft_uses_canonical_text() {
        let form = EventForm {
            title: "Run".to_string(),
            date: "2025-03-10".to_string(),
            start_time: Some("07:00".to_string()),
            ..EventForm::default()
        };
        let payload = encode_draft(&form.to_draft().expect("valid form"));
        let body = serde_json::to_value(&payload).expect("serialize payload");

        assert_eq!(
            body,
            json!({
                "title": "Run",
                "start": "2025-03-10T07:00:00",
                "end": "2025-03-10T08:00:00",
                "allDay": false,
                "color": "default"
            })
        );
    }

    #[test]
    fn created_event_requires_id() {
        let body = json!({ "title": "Run", "start": "2025-03-10T07:00:00" });
        assert!(decode_created_event(&body, &normalizer()).is_err());

        let body = json!({ "id": "42", "title": "Run", "start": "2025-03-10T07:00:00" });
        let event = decode_created_event(&body, &normalizer()).expect("created event");
        assert_eq!(event.id, "42");
    }

    #[test]
    fn empty_response_to_empty_change_set_is_unchanged() {
        let current = confirmed_event();
        for body in [Value::Null, json!({}), json!("")] {
            let merge = merge_update_response(&current, &body, &ChangeSet::default(), &normalizer())
                .expect("empty response accepted");
            assert_eq!(merge, UpdateMerge::Unchanged);
        }
    }

    #[test]
    fn partial_response_merges_only_returned_fields() {
        let mut current = confirmed_event();
        current.external_id = Some("g7".to_string());
        let changes = ChangeSet {
            title: Some("Leg day (heavy)".to_string()),
            ..ChangeSet::default()
        };
        let body = json!({ "title": "Leg day (heavy)" });

        let UpdateMerge::Merged(merged) =
            merge_update_response(&current, &body, &changes, &normalizer()).expect("merge")
        else {
            panic!("expected merged record");
        };
        assert_eq!(merged.title, "Leg day (heavy)");
        assert_eq!(merged.description, current.description);
        assert_eq!(merged.external_id, current.external_id);
        assert_eq!(merged.occurrence, current.occurrence);
    }

    #[test]
    fn full_record_response_wins_over_local_values() {
        let current = confirmed_event();
        let changes = ChangeSet {
            color: Some("#00ff00".to_string()),
            ..ChangeSet::default()
        };
        let body = json!({
            "id": "7",
            "title": "Leg day",
            "start": "2025-03-10T07:30:00",
            "end": "2025-03-10T08:30:00",
            "color": "#0000ff"
        });

        let UpdateMerge::Merged(merged) =
            merge_update_response(&current, &body, &changes, &normalizer()).expect("merge")
        else {
            panic!("expected merged record");
        };
        assert_eq!(merged.color, "#0000ff");
        assert_eq!(merged.occurrence.start_text(), "2025-03-10T07:30:00");
        assert_eq!(merged.description.as_deref(), Some("squats"));
    }

    #[test]
    fn switching_to_all_day_through_response() {
        let current = confirmed_event();
        let changes = ChangeSet {
            start: Some("2025-03-10".to_string()),
            end: Some(String::new()),
            all_day: Some(true),
            ..ChangeSet::default()
        };
        let body = json!({ "start": "2025-03-10", "end": null, "allDay": true });

        let UpdateMerge::Merged(merged) =
            merge_update_response(&current, &body, &changes, &normalizer()).expect("merge")
        else {
            panic!("expected merged record");
        };
        assert!(merged.occurrence.is_all_day());
    }

    #[test]
    fn response_without_changed_fields_is_rejected() {
        let current = confirmed_event();
        let changes = ChangeSet {
            title: Some("Upper body".to_string()),
            ..ChangeSet::default()
        };
        for body in [json!({ "ok": true }), json!("updated"), json!([1, 2]), Value::Null] {
            assert!(
                merge_update_response(&current, &body, &changes, &normalizer()).is_err(),
                "expected {body} to be rejected"
            );
        }
    }
}
