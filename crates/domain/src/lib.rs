extern crate self as optimize_domain;

pub mod decision_scope;
pub mod error;
pub mod interaction;
pub mod offer;
pub mod proposition;

pub use decision_scope::{DecisionScope, ScopeTarget};
pub use error::DomainError;
pub use interaction::{
    InteractionKind, InteractionXdm, ItemReference, PropositionInteraction, EVENT_TYPE_DISPLAY,
    EVENT_TYPE_INTERACT,
};
pub use offer::{Offer, OfferBuilder, OfferType};
pub use proposition::{OptimizeProposition, ReferenceXdm};
