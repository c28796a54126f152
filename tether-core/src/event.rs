//! Server-sent event records.

use crate::identifier::EventSourceId;
use serde::{Deserialize, Serialize};

/// Event type used when the server did not send an `event:` field.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// An event pushed by the server.
///
/// Built once per dispatch and handed to the consumer. The payload is opaque to
/// tether.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSentEvent {
    /// Session that received the event.
    pub source: EventSourceId,
    /// Event type, `"message"` unless the server named one.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data with the final line terminator removed.
    pub data: String,
    /// Origin of the final response URL.
    pub origin: String,
    /// Last event ID in effect when the event was dispatched.
    pub last_event_id: String,
}

impl ServerSentEvent {
    /// Create a new event record.
    pub fn new(
        source: EventSourceId,
        event_type: impl Into<String>,
        data: impl Into<String>,
        origin: impl Into<String>,
        last_event_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            event_type: event_type.into(),
            data: data.into(),
            origin: origin.into(),
            last_event_id: last_event_id.into(),
        }
    }

    /// Whether this is an unnamed `message` event.
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.event_type == DEFAULT_EVENT_TYPE
    }
}
