//! Propositions: the resolved offers for one decision scope.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::decision_scope::DecisionScope;
use crate::offer::Offer;

/// A resolved proposition. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeProposition {
    id: String,
    scope: String,
    scope_details: Map<String, Value>,
    offers: Vec<Offer>,
}

impl OptimizeProposition {
    /// Build a proposition, pointing every offer back at it.
    pub fn new(
        id: impl Into<String>,
        scope: impl Into<String>,
        scope_details: Map<String, Value>,
        mut offers: Vec<Offer>,
    ) -> Self {
        let id = id.into();
        for offer in &mut offers {
            offer.attach_to(&id);
        }
        Self {
            id,
            scope: scope.into(),
            scope_details,
            offers,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wire-form scope name.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn decision_scope(&self) -> DecisionScope {
        DecisionScope::new(self.scope.clone())
    }

    pub fn scope_details(&self) -> &Map<String, Value> {
        &self.scope_details
    }

    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    pub fn offer(&self, offer_id: &str) -> Option<&Offer> {
        self.offers.iter().find(|offer| offer.id() == offer_id)
    }

    /// Parse one entry of a personalization response `payload`.
    ///
    /// Returns `None` when `id`, `scope` or `items` is missing. Items that do
    /// not form an offer are skipped.
    pub fn from_event_data(data: &Value) -> Option<Self> {
        let object = data.as_object()?;
        let id = object.get("id")?.as_str().filter(|id| !id.is_empty())?;
        let scope = object.get("scope")?.as_str()?;
        let items = object.get("items")?.as_array()?;

        let scope_details = object
            .get("scopeDetails")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let offers: Vec<Offer> = items
            .iter()
            .filter_map(|item| {
                let offer = Offer::from_event_data(item, id);
                if offer.is_none() {
                    tracing::debug!(proposition_id = %id, "Skipping response item that is not an offer");
                }
                offer
            })
            .collect();

        Some(Self {
            id: id.to_string(),
            scope: scope.to_string(),
            scope_details,
            offers,
        })
    }

    /// Event-data form, as carried in response and notification payloads.
    pub fn to_event_data(&self) -> Value {
        json!({
            "id": self.id,
            "scope": self.scope,
            "scopeDetails": self.scope_details,
            "items": self.offers.iter().map(Offer::to_event_data).collect::<Vec<_>>(),
        })
    }

    /// XDM that references this proposition from a caller's own event.
    pub fn generate_reference_xdm(&self) -> ReferenceXdm {
        ReferenceXdm {
            experience: ReferenceExperience {
                decisioning: ReferenceDecisioning {
                    proposition_id: self.id.clone(),
                },
            },
        }
    }
}

/// `{"_experience": {"decisioning": {"propositionID": ...}}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceXdm {
    #[serde(rename = "_experience")]
    pub experience: ReferenceExperience,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceExperience {
    pub decisioning: ReferenceDecisioning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDecisioning {
    #[serde(rename = "propositionID")]
    pub proposition_id: String,
}
