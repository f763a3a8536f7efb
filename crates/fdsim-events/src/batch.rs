//! Received analytics batches.

use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde_json::Value;

use crate::{EventsError, EventsResult};

/// One analytics payload as posted by the SDK.
#[derive(Debug, Clone)]
pub struct EventBatch {
    /// Event records in the order the SDK sent them.
    pub events: Vec<Value>,

    /// Endpoint-relative path the batch was posted to.
    pub path: String,

    /// Request headers (payload id, SDK user agent, ...).
    pub headers: HeaderMap,

    /// Arrival time.
    pub received_at: DateTime<Utc>,
}

impl EventBatch {
    /// Parse a request body into a batch.
    ///
    /// # Errors
    ///
    /// Returns an error unless `body` is a JSON array of objects.
    pub fn parse(path: impl Into<String>, headers: HeaderMap, body: &[u8]) -> EventsResult<Self> {
        let events: Vec<Value> = serde_json::from_slice(body)?;
        if let Some(index) = events.iter().position(|event| !event.is_object()) {
            return Err(EventsError::NotAnObject { index });
        }

        Ok(Self {
            events,
            path: path.into(),
            headers,
            received_at: Utc::now(),
        })
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the batch has no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events whose `kind` field equals `kind`.
    pub fn events_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.events
            .iter()
            .filter(move |event| event.get("kind").and_then(Value::as_str) == Some(kind))
    }

    /// A header value, if present and valid text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}
