//! Single owner of the in-memory event list.
//!
//! Every operation suspends only while talking to the remote store. Once a
//! result is available the list is read and rewritten inside one synchronous
//! critical section, so interleaved operations never observe a half-applied
//! change. Later results win; there are no sequence numbers.

use crate::application::error::ReconcileError;
use crate::domain::change_set::{build_change_set, ChangeSet};
use crate::domain::identity::{dedup_keep_first, identity_matches, matching_rule};
use crate::domain::models::{CalendarEvent, EventDraft, EventForm};
use crate::domain::temporal::TemporalNormalizer;
use crate::infrastructure::calendar_store_client::{
    ExternalCalendarProvider, NoExternalProvider, RemoteCalendarStore,
};
use crate::infrastructure::event_mapper::{
    decode_created_event, decode_remote_event, encode_draft, merge_update_response,
    RemoteEventRecord, UpdateMerge,
};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

static NEXT_PLACEHOLDER: AtomicU64 = AtomicU64::new(1);

fn next_placeholder_id() -> String {
    let sequence = NEXT_PLACEHOLDER.fetch_add(1, Ordering::Relaxed);
    format!("local-{}-{sequence}", Utc::now().timestamp_micros())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Returned fields were written into the existing record.
    Merged,
    /// Nothing in the response differed from the local record.
    Unchanged,
    /// The response could not be interpreted and the list was refetched.
    Refetched,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub events: usize,
    pub replaced: usize,
    pub skipped: usize,
    pub duplicates: usize,
}

pub struct EventReconciler<S, P = NoExternalProvider>
where
    S: RemoteCalendarStore,
    P: ExternalCalendarProvider,
{
    store: Arc<S>,
    external: Arc<P>,
    owner_id: String,
    normalizer: TemporalNormalizer,
    events: Mutex<Vec<CalendarEvent>>,
}

impl<S, P> EventReconciler<S, P>
where
    S: RemoteCalendarStore,
    P: ExternalCalendarProvider,
{
    pub fn new(store: Arc<S>, external: Arc<P>, owner_id: impl Into<String>) -> Self {
        Self {
            store,
            external,
            owner_id: owner_id.into().trim().to_string(),
            normalizer: TemporalNormalizer::default(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn with_normalizer(mut self, normalizer: TemporalNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn normalizer(&self) -> &TemporalNormalizer {
        &self.normalizer
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        self.with_events(|events| events.clone())
    }

    pub fn len(&self) -> usize {
        self.with_events(|events| events.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, event_id: &str) -> Option<CalendarEvent> {
        let event_id = event_id.trim();
        self.with_events(|events| {
            events
                .iter()
                .find(|event| event.id() == Some(event_id))
                .cloned()
        })
    }

    /// Converts dialog text and runs [`Self::apply_create`].
    pub async fn create_from_form(&self, form: &EventForm) -> Result<CalendarEvent, ReconcileError> {
        let draft = form.to_draft()?;
        self.apply_create(draft).await
    }

    /// Minimal change-set turning the stored event into what the form says.
    pub fn change_set_from_form(
        &self,
        target_id: &str,
        form: &EventForm,
    ) -> Result<ChangeSet, ReconcileError> {
        let target_id = target_id.trim();
        let draft = form.to_draft()?;
        let current = self
            .find(target_id)
            .ok_or_else(|| ReconcileError::EventNotFound(target_id.to_string()))?;
        Ok(build_change_set(&current, &draft))
    }

    /// Inserts the draft optimistically, then swaps in the stored record.
    pub async fn apply_create(&self, draft: EventDraft) -> Result<CalendarEvent, ReconcileError> {
        draft.validate().map_err(ReconcileError::InvalidEvent)?;

        let pending = CalendarEvent::pending(next_placeholder_id(), &draft);
        self.with_events(|events| events.push(pending.clone()));
        info!(placeholder_id = %pending.id, title = %pending.title, "inserted pending event");

        let body = match self
            .store
            .create_event(&self.owner_id, &encode_draft(&draft))
            .await
        {
            Ok(body) => body,
            Err(error) => {
                self.discard_pending(&pending);
                warn!(placeholder_id = %pending.id, %error, "create failed; removed pending event");
                return Err(ReconcileError::remote("create event", error));
            }
        };

        match decode_created_event(&body, &self.normalizer) {
            Ok(confirmed) => {
                self.with_events(|events| confirm_pending(events, &pending, confirmed.clone()));
                info!(
                    placeholder_id = %pending.id,
                    event_id = %confirmed.id,
                    "confirmed pending event"
                );
                Ok(confirmed)
            }
            Err(error) => {
                self.discard_pending(&pending);
                self.recover("create event", error.to_string()).await?;
                self.with_events(|events| {
                    events
                        .iter()
                        .find(|event| identity_matches(event, &pending))
                        .cloned()
                })
                .ok_or_else(|| ReconcileError::UnparseableResponse {
                    operation: "create event",
                    message: "created event is missing from the refetched list".to_string(),
                })
            }
        }
    }

    /// Sends `changes` (without a body when empty) and merges the response.
    pub async fn apply_update(
        &self,
        target_id: &str,
        changes: ChangeSet,
    ) -> Result<UpdateOutcome, ReconcileError> {
        let target_id = target_id.trim();
        let current = self
            .find(target_id)
            .ok_or_else(|| ReconcileError::EventNotFound(target_id.to_string()))?;
        if current.is_pending() {
            return Err(ReconcileError::InvalidEvent(format!(
                "event '{target_id}' has not been confirmed yet"
            )));
        }

        let body_changes = (!changes.is_empty()).then_some(&changes);
        let body = self
            .store
            .update_event(target_id, body_changes)
            .await
            .map_err(|error| {
                warn!(event_id = %target_id, %error, "update failed; list left untouched");
                ReconcileError::remote("update event", error)
            })?;

        let merged = self.with_events(|events| {
            let index = events
                .iter()
                .position(|event| event.id() == Some(target_id))
                .ok_or_else(|| format!("event '{target_id}' left the list during the update"))?;
            match merge_update_response(&events[index], &body, &changes, &self.normalizer) {
                Ok(UpdateMerge::Unchanged) => Ok(UpdateOutcome::Unchanged),
                Ok(UpdateMerge::Merged(merged)) => {
                    place_at(events, index, merged);
                    Ok(UpdateOutcome::Merged)
                }
                Err(error) => Err(error.to_string()),
            }
        });

        match merged {
            Ok(outcome) => {
                info!(
                    event_id = %target_id,
                    fields = ?changes.changed_fields(),
                    ?outcome,
                    "applied update"
                );
                Ok(outcome)
            }
            Err(message) => {
                self.recover("update event", message).await?;
                Ok(UpdateOutcome::Refetched)
            }
        }
    }

    /// Removes the event once the store confirms the delete.
    pub async fn apply_delete(&self, target_id: &str) -> Result<CalendarEvent, ReconcileError> {
        let target_id = target_id.trim();
        let target = self
            .with_events(|events| delete_target(events, target_id).map(|index| events[index].clone()))
            .ok_or_else(|| ReconcileError::EventNotFound(target_id.to_string()))?;
        if target.is_pending() {
            return Err(ReconcileError::InvalidEvent(format!(
                "event '{target_id}' has not been confirmed yet"
            )));
        }

        // Mirrored events the store never persisted are only known by external id.
        let remote_id = target.id().unwrap_or(target_id).to_string();
        self.store.delete_event(&remote_id).await.map_err(|error| {
            warn!(event_id = %remote_id, %error, "delete failed; list left untouched");
            ReconcileError::remote("delete event", error)
        })?;

        let removed = self.with_events(|events| {
            delete_target(events, target_id).map(|index| events.remove(index))
        });
        info!(event_id = %remote_id, "deleted event");
        Ok(removed.unwrap_or(target))
    }

    /// Replaces the whole list with `records`, deduplicated, keeping the
    /// first of every group of matching records.
    pub fn merge_refetch_batch(&self, records: &[RemoteEventRecord]) -> MergeSummary {
        let mut mapped = Vec::with_capacity(records.len());
        let mut skipped = 0;
        for record in records {
            match decode_remote_event(record, &self.normalizer) {
                Ok(event) => mapped.push(event),
                Err(error) => {
                    skipped += 1;
                    warn!(
                        id = record.id.as_deref().unwrap_or_default(),
                        external_id = record.external_id.as_deref().unwrap_or_default(),
                        %error,
                        "skipping unusable event record"
                    );
                }
            }
        }
        let mapped_count = mapped.len();
        let batch = dedup_keep_first(mapped);
        let duplicates = mapped_count - batch.len();

        let summary = self.with_events(|events| {
            let replaced = events.len();
            *events = batch;
            MergeSummary {
                events: events.len(),
                replaced,
                skipped,
                duplicates,
            }
        });

        info!(
            events = summary.events,
            replaced = summary.replaced,
            skipped = summary.skipped,
            duplicates = summary.duplicates,
            "merged refetch batch"
        );
        summary
    }

    /// Fetches the store's events and the mirrored external events, store
    /// first, and merges them as one batch. The list is untouched on failure.
    pub async fn refresh(&self) -> Result<MergeSummary, ReconcileError> {
        let (stored, mirrored) = tokio::join!(
            self.store.list_events(&self.owner_id),
            self.external.list_mirrored_events(&self.owner_id)
        );
        let mut records = stored.map_err(|error| ReconcileError::remote("list events", error))?;
        let mirrored =
            mirrored.map_err(|error| ReconcileError::remote("list mirrored events", error))?;
        records.extend(mirrored);

        Ok(self.merge_refetch_batch(&records))
    }

    async fn recover(&self, operation: &'static str, message: String) -> Result<(), ReconcileError> {
        warn!(operation, %message, "response could not be interpreted; refetching");
        match self.refresh().await {
            Ok(_) => Ok(()),
            Err(error) => Err(ReconcileError::UnparseableResponse {
                operation,
                message: format!("{message}; refetch failed: {error}"),
            }),
        }
    }

    fn discard_pending(&self, pending: &CalendarEvent) {
        self.with_events(|events| events.retain(|event| event.id != pending.id));
    }

    fn with_events<T>(&self, apply: impl FnOnce(&mut Vec<CalendarEvent>) -> T) -> T {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut events)
    }
}

/// Swaps the confirmed record into the slot held by the pending entry, or by
/// whatever a refetch put there in the meantime.
fn confirm_pending(events: &mut Vec<CalendarEvent>, pending: &CalendarEvent, confirmed: CalendarEvent) {
    let index = events
        .iter()
        .position(|event| event.id == pending.id)
        .or_else(|| events.iter().position(|event| identity_matches(event, pending)))
        .or_else(|| events.iter().position(|event| identity_matches(event, &confirmed)));

    match index {
        Some(index) => place_at(events, index, confirmed),
        None => events.push(confirmed),
    }
}

/// Writes `incoming` at `index` and drops every other entry it now matches.
fn place_at(events: &mut Vec<CalendarEvent>, index: usize, incoming: CalendarEvent) {
    events[index] = incoming;
    let anchor = events[index].clone();
    let mut position = 0;
    events.retain(|event| {
        let keep = position == index || {
            match matching_rule(event, &anchor) {
                Some(rule) => {
                    debug!(rule = rule.as_str(), id = %event.id, "dropping superseded event");
                    false
                }
                None => true,
            }
        };
        position += 1;
        keep
    });
}

fn delete_target(events: &[CalendarEvent], target_id: &str) -> Option<usize> {
    events
        .iter()
        .position(|event| event.id() == Some(target_id))
        .or_else(|| {
            events
                .iter()
                .position(|event| event.external_id() == Some(target_id))
        })
}
