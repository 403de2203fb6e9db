//! Decides whether two event records describe the same logical event.
//!
//! The same event can reach the list through an optimistic insert, a server
//! acknowledgement and a full refetch, each with a different set of
//! identifiers populated. Rules are evaluated in priority order and the first
//! one that matches wins.

use crate::domain::models::{non_empty, CalendarEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRule {
    SameId,
    SameExternalId,
    /// Fallback for pending events that have no durable id yet.
    /// Two distinct events sharing title and start time also match here.
    SameStartAndTitle,
}

pub const IDENTITY_RULES: [IdentityRule; 3] = [
    IdentityRule::SameId,
    IdentityRule::SameExternalId,
    IdentityRule::SameStartAndTitle,
];

impl IdentityRule {
    fn applies(self, existing: &CalendarEvent, incoming: &CalendarEvent) -> bool {
        match self {
            Self::SameId => same_present(existing.id(), incoming.id()),
            Self::SameExternalId => same_present(existing.external_id(), incoming.external_id()),
            Self::SameStartAndTitle => {
                let existing_title = non_empty(Some(existing.title.as_str()));
                let incoming_title = non_empty(Some(incoming.title.as_str()));
                same_present(existing_title, incoming_title)
                    && existing.occurrence.start_text() == incoming.occurrence.start_text()
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SameId => "same_id",
            Self::SameExternalId => "same_external_id",
            Self::SameStartAndTitle => "same_start_and_title",
        }
    }
}

pub fn matching_rule(existing: &CalendarEvent, incoming: &CalendarEvent) -> Option<IdentityRule> {
    IDENTITY_RULES
        .into_iter()
        .find(|rule| rule.applies(existing, incoming))
}

pub fn identity_matches(existing: &CalendarEvent, incoming: &CalendarEvent) -> bool {
    matching_rule(existing, incoming).is_some()
}

/// Keeps the first of every group of matching events, preserving order.
pub fn dedup_keep_first(events: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
    let mut kept: Vec<CalendarEvent> = Vec::with_capacity(events.len());
    for event in events {
        if let Some(rule) = kept
            .iter()
            .find_map(|existing| matching_rule(existing, &event))
        {
            tracing::debug!(
                rule = rule.as_str(),
                id = %event.id,
                title = %event.title,
                "dropping duplicate event"
            );
            continue;
        }
        kept.push(event);
    }
    kept
}

fn same_present(left: Option<&str>, right: Option<&str>) -> bool {
    matches!((left, right), (Some(left), Some(right)) if left == right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EventState, Occurrence, DEFAULT_EVENT_COLOR};
    use chrono::NaiveDateTime;
    use proptest::prelude::*;

    fn event(id: &str, external_id: Option<&str>, title: &str, start: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            external_id: external_id.map(ToOwned::to_owned),
            title: title.to_string(),
            occurrence: Occurrence::Timed {
                start: NaiveDateTime::parse_from_str(start, "%Y-%m-%dT%H:%M:%S")
                    .expect("valid start"),
                end: None,
            },
            description: None,
            color: DEFAULT_EVENT_COLOR.to_string(),
            state: EventState::Confirmed,
        }
    }

    #[test]
    fn same_id_wins_over_differing_title() {
        let existing = event("5", None, "Run", "2025-03-10T07:00:00");
        let incoming = event("5", None, "Long run", "2025-03-10T09:00:00");
        assert_eq!(matching_rule(&existing, &incoming), Some(IdentityRule::SameId));
    }

    #[test]
    fn external_id_matches_when_local_id_missing() {
        let existing = event("", Some("g1"), "Yoga", "2025-03-10T07:00:00");
        let incoming = event("91", Some("g1"), "Yoga (moved)", "2025-03-11T07:00:00");
        assert_eq!(
            matching_rule(&existing, &incoming),
            Some(IdentityRule::SameExternalId)
        );
    }

    #[test]
    fn start_and_title_bridge_placeholder_and_durable_id() {
        let pending = event("local-1", None, "Run", "2025-03-10T07:00:00");
        let confirmed = event("42", None, " Run ", "2025-03-10T07:00:00");
        assert_eq!(
            matching_rule(&pending, &confirmed),
            Some(IdentityRule::SameStartAndTitle)
        );
    }

    #[test]
    fn empty_identifiers_never_match() {
        let left = event("", Some(" "), "", "2025-03-10T07:00:00");
        let right = event("", Some(" "), "", "2025-03-10T07:00:00");
        assert!(!identity_matches(&left, &right));
    }

    #[test]
    fn different_start_or_title_does_not_match() {
        let base = event("1", None, "Run", "2025-03-10T07:00:00");
        assert!(!identity_matches(&base, &event("2", None, "Run", "2025-03-10T07:30:00")));
        assert!(!identity_matches(&base, &event("2", None, "Swim", "2025-03-10T07:00:00")));
    }

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let events = vec![
            event("1", None, "Run", "2025-03-10T07:00:00"),
            event("2", Some("g2"), "Swim", "2025-03-10T09:00:00"),
            event("1", None, "Run (copy)", "2025-03-12T07:00:00"),
            event("", Some("g2"), "Swim", "2025-03-10T09:00:00"),
            event("3", None, "Lift", "2025-03-10T18:00:00"),
        ];
        let kept = dedup_keep_first(events);
        let ids: Vec<&str> = kept.iter().map(|event| event.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(kept[0].title, "Run");
    }

    proptest! {
        #[test]
        fn dedup_leaves_no_matching_pair(
            shapes in proptest::collection::vec((0u8..4, 0u8..3, 0u8..3), 0..16)
        ) {
            let events: Vec<CalendarEvent> = shapes
                .into_iter()
                .map(|(id, title, hour)| {
                    event(
                        &id.to_string(),
                        None,
                        &format!("session-{title}"),
                        &format!("2025-03-10T0{hour}:00:00"),
                    )
                })
                .collect();
            let kept = dedup_keep_first(events);

            for (index, left) in kept.iter().enumerate() {
                for right in kept.iter().skip(index + 1) {
                    prop_assert!(!identity_matches(left, right));
                }
            }
            prop_assert_eq!(dedup_keep_first(kept.clone()), kept);
        }
    }
}
