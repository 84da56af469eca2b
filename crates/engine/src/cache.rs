//! Proposition cache keyed by decision scope.
//!
//! Unbounded and without expiry. Entries are replaced whenever a resolution
//! returns a proposition for the same scope, and dropped only by `clear`.

use std::collections::HashMap;

use dashmap::DashMap;

use optimize_domain::{DecisionScope, OptimizeProposition};

/// A thread-safe store of the latest proposition per scope.
#[derive(Default)]
pub struct PropositionCache {
    entries: DashMap<DecisionScope, OptimizeProposition>,
}

impl PropositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a proposition, replacing any existing entry for the scope.
    pub fn put(&self, scope: DecisionScope, proposition: OptimizeProposition) {
        self.entries.insert(scope, proposition);
    }

    /// Insert propositions under their own scopes.
    pub fn merge(&self, propositions: impl IntoIterator<Item = OptimizeProposition>) {
        for proposition in propositions {
            self.put(proposition.decision_scope(), proposition);
        }
    }

    pub fn get(&self, scope: &DecisionScope) -> Option<OptimizeProposition> {
        self.entries.get(scope).map(|entry| entry.value().clone())
    }

    /// Look up several scopes at once. Absent scopes are left out.
    pub fn get_many(&self, scopes: &[DecisionScope]) -> HashMap<DecisionScope, OptimizeProposition> {
        scopes
            .iter()
            .filter_map(|scope| self.get(scope).map(|proposition| (scope.clone(), proposition)))
            .collect()
    }

    /// Find a cached proposition by its id.
    pub fn find_by_proposition_id(&self, proposition_id: &str) -> Option<OptimizeProposition> {
        self.entries
            .iter()
            .find(|entry| entry.value().id() == proposition_id)
            .map(|entry| entry.value().clone())
    }

    /// Remove every entry and return how many were removed.
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
