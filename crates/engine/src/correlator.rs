//! Tracking of in-flight update requests.
//!
//! Each update request is registered under the id of the edge event that
//! carried it. Response fragments accumulate against that id until the
//! completion signal arrives or the deadline elapses. Either terminal
//! transition removes the entry, so the caller's callback runs exactly once
//! and any later signal for the id is a no-op.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use uuid::Uuid;

use optimize_domain::{DecisionScope, OptimizeProposition};
use optimize_shared::{OptimizeError, UpstreamError};

/// Deadline for every update request.
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(15);

pub type UpdateResult = Result<HashMap<DecisionScope, OptimizeProposition>, OptimizeError>;

pub type UpdateCallback = Box<dyn FnOnce(UpdateResult) + Send + Sync + 'static>;

struct PendingUpdate {
    scopes: Vec<DecisionScope>,
    propositions: HashMap<DecisionScope, OptimizeProposition>,
    error: Option<UpstreamError>,
    callback: UpdateCallback,
    timer: AbortHandle,
}

/// An update that reached its completion signal.
///
/// The accumulated propositions are exposed so they can be merged into the
/// cache before the caller is told about them.
pub struct ResolvedUpdate {
    pub propositions: HashMap<DecisionScope, OptimizeProposition>,
    scopes: Vec<DecisionScope>,
    error: Option<UpstreamError>,
    callback: UpdateCallback,
}

impl ResolvedUpdate {
    /// Invoke the caller's callback.
    ///
    /// Succeeds with the propositions of the requested scopes, or fails with
    /// the first upstream error the request received.
    pub fn complete(self) {
        let result = match self.error {
            Some(error) => Err(OptimizeError::Upstream(error)),
            None => {
                let mut propositions = self.propositions;
                propositions.retain(|scope, _| self.scopes.contains(scope));
                Ok(propositions)
            }
        };
        (self.callback)(result);
    }
}

/// Tracks pending update requests keyed by edge event id.
pub struct PendingUpdates {
    inner: HashMap<Uuid, PendingUpdate>,
    timeout: Duration,
    expired_tx: mpsc::UnboundedSender<Uuid>,
}

impl PendingUpdates {
    /// Expired ids are sent on `expired_tx` once their deadline elapses; the
    /// receiver is expected to call [`Self::expire`] with them.
    pub fn new(expired_tx: mpsc::UnboundedSender<Uuid>) -> Self {
        Self {
            inner: HashMap::new(),
            timeout: DEFAULT_UPDATE_TIMEOUT,
            expired_tx,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register a request and start its deadline timer.
    pub fn register(&mut self, id: Uuid, scopes: Vec<DecisionScope>, callback: UpdateCallback) {
        let expired_tx = self.expired_tx.clone();
        let timeout = self.timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = expired_tx.send(id);
        })
        .abort_handle();

        tracing::debug!(request_event_id = %id, scope_count = scopes.len(), "Registered pending update");

        let previous = self.inner.insert(
            id,
            PendingUpdate {
                scopes,
                propositions: HashMap::new(),
                error: None,
                callback,
                timer,
            },
        );
        if let Some(previous) = previous {
            previous.timer.abort();
            tracing::warn!(request_event_id = %id, "Replaced pending update with duplicate id");
        }
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.inner.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Add response propositions to a pending request.
    ///
    /// A later proposition for the same scope replaces an earlier one.
    /// Returns false if the request is not pending.
    pub fn accumulate(&mut self, id: &Uuid, propositions: Vec<OptimizeProposition>) -> bool {
        let Some(pending) = self.inner.get_mut(id) else {
            tracing::debug!(request_event_id = %id, "Discarding propositions for untracked request");
            return false;
        };

        for proposition in propositions {
            pending
                .propositions
                .insert(proposition.decision_scope(), proposition);
        }
        tracing::debug!(
            request_event_id = %id,
            accumulated = pending.propositions.len(),
            "Accumulated response propositions"
        );
        true
    }

    /// Record an upstream error. The first error recorded wins.
    ///
    /// Returns false if the request is not pending.
    pub fn record_error(&mut self, id: &Uuid, error: UpstreamError) -> bool {
        let Some(pending) = self.inner.get_mut(id) else {
            tracing::debug!(request_event_id = %id, "Discarding error for untracked request");
            return false;
        };

        tracing::warn!(request_event_id = %id, error = %error, "Upstream error for pending update");
        pending.error.get_or_insert(error);
        true
    }

    /// Take a pending request that received its completion signal.
    ///
    /// Stops the deadline timer. Returns `None` if the request is not pending.
    pub fn resolve(&mut self, id: &Uuid) -> Option<ResolvedUpdate> {
        let Some(pending) = self.inner.remove(id) else {
            tracing::debug!(request_event_id = %id, "Ignoring completion for untracked request");
            return None;
        };

        pending.timer.abort();
        Some(ResolvedUpdate {
            propositions: pending.propositions,
            scopes: pending.scopes,
            error: pending.error,
            callback: pending.callback,
        })
    }

    /// Fail a pending request with a timeout.
    ///
    /// Returns false if the request already completed.
    pub fn expire(&mut self, id: &Uuid) -> bool {
        let Some(pending) = self.inner.remove(id) else {
            tracing::debug!(request_event_id = %id, "Deadline fired for completed request");
            return false;
        };

        tracing::warn!(
            request_event_id = %id,
            timeout_ms = self.timeout.as_millis() as u64,
            discarded = pending.propositions.len(),
            "Update request timed out"
        );
        pending.timer.abort();
        (pending.callback)(Err(OptimizeError::Timeout(self.timeout)));
        true
    }

    /// Fail a pending request with an arbitrary error.
    ///
    /// Returns false if the request is not pending.
    pub fn fail(&mut self, id: &Uuid, error: OptimizeError) -> bool {
        let Some(pending) = self.inner.remove(id) else {
            return false;
        };

        pending.timer.abort();
        (pending.callback)(Err(error));
        true
    }

    /// Drop every pending request without invoking callbacks.
    pub fn clear(&mut self) -> usize {
        let count = self.inner.len();
        for (_, pending) in self.inner.drain() {
            pending.timer.abort();
        }
        count
    }
}

impl Drop for PendingUpdates {
    fn drop(&mut self) {
        self.clear();
    }
}
