//! Port traits for the host event hub.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use optimize_shared::{Event, OptimizeError};

/// Callback invoked for every event matching a subscription.
///
/// Handlers run on the dispatching task and must not block.
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync + 'static>;

/// Event hub errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The hub no longer accepts events.
    #[error("Event hub is closed")]
    Closed,

    /// The hub refused the event.
    #[error("Event {event_name} rejected: {reason}")]
    Rejected { event_name: String, reason: String },
}

impl HubError {
    pub fn rejected(event_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            event_name: event_name.into(),
            reason: reason.into(),
        }
    }
}

impl From<HubError> for OptimizeError {
    fn from(error: HubError) -> Self {
        OptimizeError::Dispatch(error.to_string())
    }
}

// =============================================================================
// Event Hub Port
// =============================================================================

/// Publish/subscribe access to the host.
///
/// Events dispatched from a single task reach subscribers in dispatch order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventHub: Send + Sync {
    /// Hand an event to the host. Returns the event id.
    async fn dispatch(&self, event: Event) -> Result<Uuid, HubError>;

    /// Register `handler` for events with the given type and source.
    async fn subscribe(
        &self,
        event_type: &str,
        source: &str,
        handler: EventHandler,
    ) -> Result<(), HubError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_errors_become_dispatch_errors() {
        let err: OptimizeError = HubError::rejected("Edge Request", "queue full").into();
        assert_eq!(
            err,
            OptimizeError::Dispatch("Event Edge Request rejected: queue full".into())
        );
    }

    #[tokio::test]
    async fn mock_hub_returns_configured_id() {
        let id = Uuid::new_v4();
        let mut hub = MockEventHub::new();
        hub.expect_dispatch().times(1).returning(move |_| Ok(id));

        let event = Event::new(
            "test",
            optimize_shared::event_type::OPTIMIZE,
            optimize_shared::event_source::REQUEST_CONTENT,
            serde_json::Map::new(),
        );
        assert_eq!(hub.dispatch(event).await, Ok(id));
    }
}
