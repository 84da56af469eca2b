//! Host events and their type/source vocabulary
//!
//! Every interaction with the host event hub is an [`Event`]: a named,
//! typed envelope around a JSON object. Payload structs in [`crate::requests`]
//! and [`crate::responses`] are converted to and from event data at the
//! boundary, so the engine never reads event data by string key.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::OptimizeError;

// =============================================================================
// Event Vocabulary
// =============================================================================

/// Event types
pub mod event_type {
    pub const EDGE: &str = "com.adobe.eventType.edge";
    pub const OPTIMIZE: &str = "com.adobe.eventType.optimize";
    pub const GENERIC_IDENTITY: &str = "com.adobe.eventType.generic.identity";
    pub const CONFIGURATION: &str = "com.adobe.eventType.configuration";
}

/// Event sources
pub mod event_source {
    pub const REQUEST_CONTENT: &str = "com.adobe.eventSource.requestContent";
    pub const RESPONSE_CONTENT: &str = "com.adobe.eventSource.responseContent";
    pub const ERROR_RESPONSE_CONTENT: &str = "com.adobe.eventSource.errorResponseContent";
    pub const CONTENT_COMPLETE: &str = "com.adobe.eventSource.contentComplete";
    pub const NOTIFICATION: &str = "com.adobe.eventSource.notification";
    pub const REQUEST_RESET: &str = "com.adobe.eventSource.requestReset";
    /// Edge handle type for personalization decisions
    pub const PERSONALIZATION_DECISIONS: &str = "personalization:decisions";
}

/// Event names
pub mod event_name {
    pub const UPDATE_PROPOSITIONS_REQUEST: &str = "Optimize Update Propositions Request";
    pub const GET_PROPOSITIONS_REQUEST: &str = "Optimize Get Propositions Request";
    pub const GET_PROPOSITIONS_RESPONSE: &str = "Optimize Response";
    pub const TRACK_PROPOSITIONS_REQUEST: &str = "Optimize Track Propositions Request";
    pub const EDGE_PERSONALIZATION_REQUEST: &str = "Edge Optimize Personalization Request";
    pub const EDGE_INTERACTION_REQUEST: &str = "Edge Optimize Proposition Interaction Request";
    pub const PERSONALIZATION_NOTIFICATION: &str = "Optimize Notification";
    pub const UPDATE_COMPLETE: &str = "Optimize Update Propositions Complete";
}

// =============================================================================
// Event Envelope
// =============================================================================

/// A host event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event id, used as the correlation id for outbound requests
    pub id: Uuid,
    pub name: String,
    pub event_type: String,
    pub source: String,
    /// Always a JSON object
    pub data: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(
        name: impl Into<String>,
        event_type: impl Into<String>,
        source: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            event_type: event_type.into(),
            source: source.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// Build an event whose data is a serialized payload.
    ///
    /// Payloads that do not serialize to a JSON object are rejected.
    pub fn with_payload<T: Serialize>(
        name: impl Into<String>,
        event_type: impl Into<String>,
        source: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(payload)? {
            Value::Object(data) => Ok(Self::new(name, event_type, source, data)),
            other => Err(serde::ser::Error::custom(format!(
                "event data must be an object, got {other}"
            ))),
        }
    }

    /// Parse the event data into a typed payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.data.clone()))
    }

    /// Parse an inbound response payload.
    ///
    /// # Errors
    ///
    /// `OptimizeError::MalformedResponse` naming the event when the data does
    /// not have the payload's shape.
    pub fn response<T: DeserializeOwned>(&self) -> Result<T, OptimizeError> {
        self.payload().map_err(|e| {
            OptimizeError::MalformedResponse(format!("{} ({}): {e}", self.name, self.id))
        })
    }

    /// Whether this event has the given type and source.
    pub fn is(&self, event_type: &str, source: &str) -> bool {
        self.event_type == event_type && self.source == source
    }
}
