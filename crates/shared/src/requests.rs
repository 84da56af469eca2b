//! Outbound request payloads
//!
//! Two kinds of request leave the engine:
//! - [`OptimizeRequest`]: the Optimize request-content record, dispatched for
//!   every update/track call so hosts can observe what was asked for
//! - [`EdgeRequest`]: the network request event handed to the edge transport

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use optimize_domain::{DecisionScope, InteractionXdm};

/// XDM event type of a personalization query
pub const PERSONALIZATION_REQUEST_EVENT_TYPE: &str = "personalization.request";

// =============================================================================
// Optimize Request Record
// =============================================================================

/// Kind of Optimize request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    UpdatePropositions,
    GetPropositions,
    TrackPropositions,
}

/// Request-content record event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    #[serde(rename = "requesttype")]
    pub request_type: RequestType,
    #[serde(
        rename = "decisionscopes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub decision_scopes: Option<Vec<DecisionScope>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xdm: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(
        rename = "propositioninteractions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub proposition_interactions: Option<InteractionXdm>,
}

impl OptimizeRequest {
    /// Update request for the given (already validated) scopes.
    pub fn update(
        decision_scopes: Vec<DecisionScope>,
        xdm: Option<Map<String, Value>>,
        data: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            request_type: RequestType::UpdatePropositions,
            decision_scopes: Some(decision_scopes),
            xdm,
            data,
            proposition_interactions: None,
        }
    }

    /// Track request for one offer interaction.
    pub fn track(interaction: InteractionXdm) -> Self {
        Self {
            request_type: RequestType::TrackPropositions,
            decision_scopes: None,
            xdm: None,
            data: None,
            proposition_interactions: Some(interaction),
        }
    }
}

// =============================================================================
// Edge Request
// =============================================================================

/// Edge network request event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRequest {
    pub xdm: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<EdgeQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(rename = "datasetId", default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeQuery {
    pub personalization: PersonalizationQuery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalizationQuery {
    #[serde(rename = "decisionScopes")]
    pub decision_scopes: Vec<String>,
}

impl EdgeRequest {
    /// Personalization query for `scopes`.
    ///
    /// The caller's XDM is kept; its `eventType` is always replaced by
    /// `personalization.request`.
    pub fn personalization(
        scopes: &[DecisionScope],
        xdm: Option<Map<String, Value>>,
        data: Option<Map<String, Value>>,
        dataset_id: Option<String>,
    ) -> Self {
        let mut xdm = xdm.unwrap_or_default();
        xdm.insert(
            "eventType".to_string(),
            Value::String(PERSONALIZATION_REQUEST_EVENT_TYPE.to_string()),
        );

        Self {
            xdm,
            query: Some(EdgeQuery {
                personalization: PersonalizationQuery {
                    decision_scopes: scopes.iter().map(|s| s.name().to_string()).collect(),
                },
            }),
            data,
            dataset_id,
        }
    }

    /// Tracking request carrying one interaction XDM.
    pub fn interaction(
        interaction: &InteractionXdm,
        dataset_id: Option<String>,
    ) -> Result<Self, serde_json::Error> {
        let xdm = match serde_json::to_value(interaction)? {
            Value::Object(map) => map,
            other => {
                return Err(serde::ser::Error::custom(format!(
                    "interaction XDM must be an object, got {other}"
                )))
            }
        };

        Ok(Self {
            xdm,
            query: None,
            data: None,
            dataset_id,
        })
    }

    /// Scope names queried by this request, empty for tracking requests.
    pub fn scope_names(&self) -> &[String] {
        self.query
            .as_ref()
            .map(|q| q.personalization.decision_scopes.as_slice())
            .unwrap_or_default()
    }
}
