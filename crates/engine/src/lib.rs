//! Optimize Engine library.
//!
//! Resolves personalization propositions for decision scopes by exchanging
//! events with a host event hub, caches the results, and reports offer
//! interactions.
//!
//! ## Structure
//!
//! - `ports` - The event hub contract the engine depends on
//! - `hub` - In-process event hub implementation
//! - `cache` - Proposition cache keyed by decision scope
//! - `correlator` - In-flight update tracking and deadlines
//! - `config` - Extension configuration
//! - `extension` - The orchestrator tying the pieces together

pub mod cache;
pub mod config;
pub mod correlator;
pub mod extension;
pub mod hub;
pub mod ports;

pub use cache::PropositionCache;
pub use config::OptimizeConfig;
pub use correlator::{PendingUpdates, UpdateResult, DEFAULT_UPDATE_TIMEOUT};
pub use extension::{wait_for, OptimizeExtension};
pub use hub::InMemoryEventHub;
pub use ports::{EventHandler, EventHub, HubError};

#[cfg(test)]
mod e2e_tests;
