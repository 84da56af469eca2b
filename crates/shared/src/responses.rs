//! Inbound response payloads and engine notifications

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use optimize_domain::OptimizeProposition;

use crate::error::UpstreamError;

// =============================================================================
// Edge Responses
// =============================================================================

/// Personalization decisions returned by the edge for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalizationResponse {
    /// Raw proposition entries; parsed leniently by [`Self::propositions`]
    #[serde(default)]
    pub payload: Vec<Value>,
    #[serde(rename = "requestEventId", default)]
    pub request_event_id: Option<String>,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
}

impl PersonalizationResponse {
    /// Parse every payload entry, skipping the ones that are not propositions.
    pub fn propositions(&self) -> Vec<OptimizeProposition> {
        self.payload
            .iter()
            .filter_map(|entry| {
                let proposition = OptimizeProposition::from_event_data(entry);
                if proposition.is_none() {
                    tracing::warn!(
                        request_event_id = ?self.request_event_id,
                        "Skipping malformed proposition in personalization response"
                    );
                }
                proposition
            })
            .collect()
    }
}

/// Error response returned by the edge for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeErrorResponse {
    #[serde(rename = "requestEventId", default)]
    pub request_event_id: Option<String>,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub errors: Vec<UpstreamError>,
}

// =============================================================================
// Engine Signals
// =============================================================================

/// Completion signal for an update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateComplete {
    #[serde(rename = "completedUpdateRequestForEventId")]
    pub completed_update_request_for_event_id: String,
}

/// Notification dispatched after propositions are merged into the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropositionsNotification {
    pub propositions: Vec<Value>,
}

impl PropositionsNotification {
    pub fn new<'a>(propositions: impl IntoIterator<Item = &'a OptimizeProposition>) -> Self {
        Self {
            propositions: propositions
                .into_iter()
                .map(OptimizeProposition::to_event_data)
                .collect(),
        }
    }

    /// Parse the carried propositions back into the domain model.
    pub fn decode(&self) -> Vec<OptimizeProposition> {
        self.propositions
            .iter()
            .filter_map(OptimizeProposition::from_event_data)
            .collect()
    }
}

/// Answer to a host-dispatched get propositions request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropositionsResponse {
    #[serde(rename = "requestEventId")]
    pub request_event_id: String,
    pub propositions: Vec<Value>,
}

impl PropositionsResponse {
    pub fn new<'a>(
        request_event_id: Uuid,
        propositions: impl IntoIterator<Item = &'a OptimizeProposition>,
    ) -> Self {
        Self {
            request_event_id: request_event_id.to_string(),
            propositions: PropositionsNotification::new(propositions).propositions,
        }
    }
}
