//! In-process event hub.
//!
//! Subscribers register a handler for one (type, source) pair. Dispatch
//! records the event and invokes every matching handler on the dispatching
//! task, so events dispatched from one task arrive in order.
//!
//! A hub built with [`InMemoryEventHub::recording`] also keeps every
//! dispatched event in a history, which tests use to observe outbound
//! requests. The plain hub keeps nothing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, RwLock};
use uuid::Uuid;

use optimize_shared::Event;

use crate::ports::{EventHandler, EventHub, HubError};

struct Subscription {
    event_type: String,
    source: String,
    handler: EventHandler,
}

/// Event hub that delivers events to in-process subscribers.
#[derive(Clone, Default)]
pub struct InMemoryEventHub {
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
    history: Option<Arc<Mutex<Vec<Event>>>>,
    dispatched: Arc<Notify>,
}

impl InMemoryEventHub {
    /// Create a hub with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hub that records every dispatched event.
    pub fn recording() -> Self {
        Self {
            history: Some(Arc::default()),
            ..Self::default()
        }
    }

    /// Get the number of subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// All dispatched events with the given type and source, oldest first.
    ///
    /// Always empty unless the hub is recording.
    pub async fn events_with(&self, event_type: &str, source: &str) -> Vec<Event> {
        let Some(history) = &self.history else {
            return Vec::new();
        };
        history
            .lock()
            .await
            .iter()
            .filter(|event| event.is(event_type, source))
            .cloned()
            .collect()
    }

    /// Wait until at least `count` matching events were dispatched.
    ///
    /// Returns whatever matched when `timeout` elapses, possibly fewer than
    /// `count` events.
    pub async fn wait_for_events(
        &self,
        event_type: &str,
        source: &str,
        count: usize,
        timeout: Duration,
    ) -> Vec<Event> {
        let wait = async {
            loop {
                let notified = self.dispatched.notified();
                let events = self.events_with(event_type, source).await;
                if events.len() >= count {
                    return events;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(events) => events,
            Err(_) => self.events_with(event_type, source).await,
        }
    }

    /// Forget dispatched events.
    pub async fn clear_history(&self) {
        if let Some(history) = &self.history {
            history.lock().await.clear();
        }
    }
}

#[async_trait]
impl EventHub for InMemoryEventHub {
    async fn dispatch(&self, event: Event) -> Result<Uuid, HubError> {
        let id = event.id;
        tracing::debug!(
            event_id = %id,
            event_name = %event.name,
            event_type = %event.event_type,
            source = %event.source,
            "Dispatching event"
        );

        if let Some(history) = &self.history {
            history.lock().await.push(event.clone());
        }

        let handlers: Vec<EventHandler> = self
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|sub| event.is(&sub.event_type, &sub.source))
            .map(|sub| Arc::clone(&sub.handler))
            .collect();

        for handler in handlers {
            handler(event.clone());
        }

        self.dispatched.notify_waiters();
        Ok(id)
    }

    async fn subscribe(
        &self,
        event_type: &str,
        source: &str,
        handler: EventHandler,
    ) -> Result<(), HubError> {
        self.subscriptions.write().await.push(Subscription {
            event_type: event_type.to_string(),
            source: source.to_string(),
            handler,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimize_shared::{event_source, event_type};
    use serde_json::Map;
    use std::sync::Mutex as StdMutex;

    fn event(name: &str, event_type: &str, source: &str) -> Event {
        Event::new(name, event_type, source, Map::new())
    }

    #[tokio::test]
    async fn delivers_only_matching_events_in_order() {
        let hub = InMemoryEventHub::new();
        let received = Arc::new(StdMutex::new(Vec::new()));

        let sink = Arc::clone(&received);
        hub.subscribe(
            event_type::EDGE,
            event_source::PERSONALIZATION_DECISIONS,
            Arc::new(move |event: Event| sink.lock().unwrap().push(event.name)),
        )
        .await
        .unwrap();

        hub.dispatch(event("first", event_type::EDGE, event_source::PERSONALIZATION_DECISIONS))
            .await
            .unwrap();
        hub.dispatch(event("other", event_type::EDGE, event_source::REQUEST_CONTENT))
            .await
            .unwrap();
        hub.dispatch(event("second", event_type::EDGE, event_source::PERSONALIZATION_DECISIONS))
            .await
            .unwrap();

        assert_eq!(*received.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(hub.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn dispatch_returns_event_id_and_records_history() {
        let hub = InMemoryEventHub::recording();
        let event = event("request", event_type::OPTIMIZE, event_source::REQUEST_CONTENT);
        let expected = event.id;

        assert_eq!(hub.dispatch(event).await, Ok(expected));

        let history = hub
            .events_with(event_type::OPTIMIZE, event_source::REQUEST_CONTENT)
            .await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, expected);

        hub.clear_history().await;
        assert!(hub
            .events_with(event_type::OPTIMIZE, event_source::REQUEST_CONTENT)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn plain_hub_keeps_no_history() {
        let hub = InMemoryEventHub::new();
        hub.dispatch(event("request", event_type::OPTIMIZE, event_source::REQUEST_CONTENT))
            .await
            .unwrap();

        assert!(hub.history.is_none());
        assert!(hub
            .events_with(event_type::OPTIMIZE, event_source::REQUEST_CONTENT)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn wait_for_events_sees_later_dispatch() {
        let hub = InMemoryEventHub::recording();
        let producer = hub.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer
                .dispatch(event("late", event_type::EDGE, event_source::REQUEST_CONTENT))
                .await
                .unwrap();
        });

        let events = hub
            .wait_for_events(
                event_type::EDGE,
                event_source::REQUEST_CONTENT,
                1,
                Duration::from_secs(1),
            )
            .await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_events_gives_up_after_timeout() {
        let hub = InMemoryEventHub::recording();
        let events = hub
            .wait_for_events(
                event_type::EDGE,
                event_source::REQUEST_CONTENT,
                1,
                Duration::from_secs(1),
            )
            .await;
        assert!(events.is_empty());
    }
}
