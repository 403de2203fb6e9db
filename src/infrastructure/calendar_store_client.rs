use crate::domain::change_set::ChangeSet;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{RemoteEventPayload, RemoteEventRecord};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Authoritative store for the owner's events.
///
/// Create and update return the raw response body (`Value::Null` when the
/// body is empty) so the caller decides whether it is usable.
#[async_trait]
pub trait RemoteCalendarStore: Send + Sync {
    async fn list_events(&self, owner_id: &str) -> Result<Vec<RemoteEventRecord>, InfraError>;

    async fn create_event(
        &self,
        owner_id: &str,
        payload: &RemoteEventPayload,
    ) -> Result<Value, InfraError>;

    /// `None` sends the update without a body.
    async fn update_event(
        &self,
        event_id: &str,
        changes: Option<&ChangeSet>,
    ) -> Result<Value, InfraError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError>;
}

/// Read-only source of events mirrored from an external calendar.
#[async_trait]
pub trait ExternalCalendarProvider: Send + Sync {
    async fn list_mirrored_events(
        &self,
        owner_id: &str,
    ) -> Result<Vec<RemoteEventRecord>, InfraError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalProvider;

#[async_trait]
impl ExternalCalendarProvider for NoExternalProvider {
    async fn list_mirrored_events(
        &self,
        _owner_id: &str,
    ) -> Result<Vec<RemoteEventRecord>, InfraError> {
        Ok(Vec::new())
    }
}

/// Store for offline use; every call fails without touching the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCalendarStore;

impl OfflineCalendarStore {
    fn unavailable() -> InfraError {
        InfraError::Network("no calendar store configured".to_string())
    }
}

#[async_trait]
impl RemoteCalendarStore for OfflineCalendarStore {
    async fn list_events(&self, _owner_id: &str) -> Result<Vec<RemoteEventRecord>, InfraError> {
        Err(Self::unavailable())
    }

    async fn create_event(
        &self,
        _owner_id: &str,
        _payload: &RemoteEventPayload,
    ) -> Result<Value, InfraError> {
        Err(Self::unavailable())
    }

    async fn update_event(
        &self,
        _event_id: &str,
        _changes: Option<&ChangeSet>,
    ) -> Result<Value, InfraError> {
        Err(Self::unavailable())
    }

    async fn delete_event(&self, _event_id: &str) -> Result<(), InfraError> {
        Err(Self::unavailable())
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestCalendarStore {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
    external_events_path: Option<String>,
}

impl ReqwestCalendarStore {
    pub fn new(
        base_url: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let base_url = Url::parse(base_url).map_err(|error| {
            InfraError::InvalidConfig(format!("invalid calendar store url '{base_url}': {error}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(InfraError::InvalidConfig(format!(
                "calendar store url cannot be a base: {base_url}"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| InfraError::Network(format!("failed to build http client: {error}")))?;

        Ok(Self {
            client,
            base_url,
            access_token: access_token
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty()),
            external_events_path: None,
        })
    }

    /// Serves mirrored events from `{base}/{path}?userId=` as well.
    pub fn with_external_events_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = path.trim().trim_matches('/');
        self.external_events_path = (!path.is_empty()).then(|| path.to_string());
        self
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::InvalidConfig(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("calendar store url cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.access_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<String, InfraError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("network error while {action}: {error}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Network(format!("failed reading response while {action}: {error}"))
        })?;

        if !status.is_success() {
            return Err(InfraError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn list_records(
        &self,
        segments: &[&str],
        owner_id: &str,
        action: &str,
    ) -> Result<Vec<RemoteEventRecord>, InfraError> {
        Self::ensure_non_empty(owner_id, "owner id")?;
        let endpoint = self.endpoint(segments)?;
        let request = self.client.get(endpoint).query(&[("userId", owner_id)]);
        let body = self.send(request, action).await?;
        parse_record_list(&body)
    }
}

#[async_trait]
impl RemoteCalendarStore for ReqwestCalendarStore {
    async fn list_events(&self, owner_id: &str) -> Result<Vec<RemoteEventRecord>, InfraError> {
        self.list_records(&["events"], owner_id, "listing events")
            .await
    }

    async fn create_event(
        &self,
        owner_id: &str,
        payload: &RemoteEventPayload,
    ) -> Result<Value, InfraError> {
        Self::ensure_non_empty(owner_id, "owner id")?;
        let endpoint = self.endpoint(&["events"])?;
        let request = self
            .client
            .post(endpoint)
            .query(&[("userId", owner_id)])
            .json(payload);
        let body = self.send(request, "creating event").await?;
        Ok(parse_body(&body))
    }

    async fn update_event(
        &self,
        event_id: &str,
        changes: Option<&ChangeSet>,
    ) -> Result<Value, InfraError> {
        Self::ensure_non_empty(event_id, "event id")?;
        let endpoint = self.endpoint(&["events", event_id])?;
        let mut request = self.client.patch(endpoint);
        if let Some(changes) = changes {
            request = request.json(changes);
        }
        let body = self.send(request, "updating event").await?;
        Ok(parse_body(&body))
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError> {
        Self::ensure_non_empty(event_id, "event id")?;
        let endpoint = self.endpoint(&["events", event_id])?;
        self.send(self.client.delete(endpoint), "deleting event")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ExternalCalendarProvider for ReqwestCalendarStore {
    async fn list_mirrored_events(
        &self,
        owner_id: &str,
    ) -> Result<Vec<RemoteEventRecord>, InfraError> {
        let Some(path) = self.external_events_path.as_deref() else {
            return Ok(Vec::new());
        };
        let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
        self.list_records(&segments, owner_id, "listing mirrored events")
            .await
    }
}

/// Non-JSON bodies are kept as strings so the caller can report them.
fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

/// Accepts a bare array or an object wrapping it in `items`, `events` or `data`.
///
/// Items that do not deserialize are skipped so one bad record cannot block
/// the whole list.
fn parse_record_list(body: &str) -> Result<Vec<RemoteEventRecord>, InfraError> {
    let parsed: Value = serde_json::from_str(body).map_err(|error| {
        InfraError::InvalidRecord(format!("invalid events list payload: {error}; body={body}"))
    })?;
    let items = match parsed {
        Value::Array(items) => items,
        Value::Object(mut fields) => match ["items", "events", "data"]
            .iter()
            .find_map(|key| fields.remove(*key))
        {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) => Vec::new(),
            Some(other) => {
                return Err(InfraError::InvalidRecord(format!(
                    "events list payload is not a list: {other}"
                )));
            }
        },
        Value::Null => Vec::new(),
        other => {
            return Err(InfraError::InvalidRecord(format!(
                "events list payload is not a list: {other}"
            )));
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<RemoteEventRecord>(item) {
            Ok(record) => records.push(record),
            Err(error) => warn!(index, %error, "skipping malformed event record"),
        }
    }
    Ok(records)
}
