//! Tracking payloads for offer display and tap interactions.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DomainError;
use crate::offer::Offer;
use crate::proposition::OptimizeProposition;

pub const EVENT_TYPE_DISPLAY: &str = "decisioning.propositionDisplay";
pub const EVENT_TYPE_INTERACT: &str = "decisioning.propositionInteract";

/// The kind of interaction being reported for an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Display,
    Tap,
}

impl InteractionKind {
    pub fn xdm_event_type(&self) -> &'static str {
        match self {
            Self::Display => EVENT_TYPE_DISPLAY,
            Self::Tap => EVENT_TYPE_INTERACT,
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Display => write!(f, "display"),
            Self::Tap => write!(f, "tap"),
        }
    }
}

/// Interaction XDM for a single offer of a single proposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionXdm {
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(rename = "_experience")]
    pub experience: InteractionExperience,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionExperience {
    pub decisioning: InteractionDecisioning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionDecisioning {
    pub propositions: Vec<PropositionInteraction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropositionInteraction {
    pub id: String,
    pub scope: String,
    pub scope_details: Map<String, Value>,
    pub items: Vec<ItemReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReference {
    pub id: String,
}

impl InteractionXdm {
    /// Build the tracking XDM for `offer` within `proposition`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OfferNotInProposition` when the offer's back
    /// reference does not name this proposition or the proposition does not
    /// list the offer.
    pub fn for_offer(
        kind: InteractionKind,
        proposition: &OptimizeProposition,
        offer: &Offer,
    ) -> Result<Self, DomainError> {
        if offer.proposition_id() != proposition.id() || proposition.offer(offer.id()).is_none() {
            return Err(DomainError::offer_not_in_proposition(
                offer.id(),
                proposition.id(),
            ));
        }

        Ok(Self {
            event_type: kind.xdm_event_type().to_string(),
            experience: InteractionExperience {
                decisioning: InteractionDecisioning {
                    propositions: vec![PropositionInteraction {
                        id: proposition.id().to_string(),
                        scope: proposition.scope().to_string(),
                        scope_details: proposition.scope_details().clone(),
                        items: vec![ItemReference {
                            id: offer.id().to_string(),
                        }],
                    }],
                },
            },
        })
    }

    /// Convenience for display tracking.
    pub fn display(proposition: &OptimizeProposition, offer: &Offer) -> Result<Self, DomainError> {
        Self::for_offer(InteractionKind::Display, proposition, offer)
    }

    /// Convenience for tap tracking.
    pub fn tap(proposition: &OptimizeProposition, offer: &Offer) -> Result<Self, DomainError> {
        Self::for_offer(InteractionKind::Tap, proposition, offer)
    }
}
