//! Shared harness for end-to-end flows through the in-memory hub.
//!
//! The harness plays the part of the edge transport: tests read the edge
//! requests the extension dispatched and answer them with response, error
//! and completion events, just as the host would.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use optimize_shared::{event_name, event_source, event_type, Event};

use crate::cache::PropositionCache;
use crate::config::OptimizeConfig;
use crate::extension::OptimizeExtension;
use crate::hub::InMemoryEventHub;
use crate::ports::EventHub;

pub const EDGE_CONFIG_ID: &str = "ffffffff-ffff-ffff-ffff-ffffffffffff";
pub const DATASET_ID: &str = "111111111111111111111111";

pub const ODC_ACTIVITY: &str = "xcore:offer-activity:1111111111111111";
pub const ODC_PLACEMENT: &str = "xcore:offer-placement:1111111111111111";
pub const ODC_SCOPE: &str = "eyJhY3Rpdml0eUlkIjoieGNvcmU6b2ZmZXItYWN0aXZpdHk6MTExMTExMTExMTExMTExMSIsInBsYWNlbWVudElkIjoieGNvcmU6b2ZmZXItcGxhY2VtZW50OjExMTExMTExMTExMTExMTEifQ==";

const WAIT: Duration = Duration::from_secs(1);

pub struct TestHarness {
    pub hub: InMemoryEventHub,
    pub cache: Arc<PropositionCache>,
    pub extension: OptimizeExtension,
}

impl TestHarness {
    pub async fn start(config: OptimizeConfig) -> Self {
        let hub = InMemoryEventHub::recording();
        let cache = Arc::new(PropositionCache::new());
        let extension =
            OptimizeExtension::start(Arc::new(hub.clone()), Arc::clone(&cache), config)
                .await
                .expect("extension should start");
        Self {
            hub,
            cache,
            extension,
        }
    }

    /// Edge configuration and dataset id both set.
    pub async fn configured() -> Self {
        Self::start(OptimizeConfig::new(EDGE_CONFIG_ID).with_dataset_id(DATASET_ID)).await
    }

    pub async fn optimize_requests(&self) -> Vec<Event> {
        self.hub
            .events_with(event_type::OPTIMIZE, event_source::REQUEST_CONTENT)
            .await
    }

    pub async fn edge_requests(&self) -> Vec<Event> {
        self.hub
            .events_with(event_type::EDGE, event_source::REQUEST_CONTENT)
            .await
    }

    /// Wait for the next edge request after the `seen` ones already handled.
    pub async fn next_edge_request(&self, seen: usize) -> Event {
        let events = self
            .hub
            .wait_for_events(event_type::EDGE, event_source::REQUEST_CONTENT, seen + 1, WAIT)
            .await;
        events
            .get(seen)
            .cloned()
            .expect("edge request should be dispatched")
    }

    /// Answer a request with personalization decisions.
    pub async fn respond(&self, request_event_id: Uuid, payload: Vec<Value>) {
        let data = json!({
            "payload": payload,
            "requestEventId": request_event_id.to_string(),
            "requestId": "BBBBBBBB-BBBB-BBBB-BBBB-BBBBBBBBBBBB",
            "type": "personalization:decisions"
        });
        self.dispatch(
            "AEP Response Event Handle",
            event_type::EDGE,
            event_source::PERSONALIZATION_DECISIONS,
            data,
        )
        .await;
    }

    /// Answer a request with an error.
    pub async fn respond_error(&self, request_event_id: Uuid, error: Value) {
        let data = json!({
            "requestEventId": request_event_id.to_string(),
            "requestId": "BBBBBBBB-BBBB-BBBB-BBBB-BBBBBBBBBBBB",
            "errors": [error]
        });
        self.dispatch(
            "AEP Error Response",
            event_type::EDGE,
            event_source::ERROR_RESPONSE_CONTENT,
            data,
        )
        .await;
    }

    /// Signal that all responses for a request were delivered.
    pub async fn complete(&self, request_event_id: Uuid) {
        let data = json!({ "completedUpdateRequestForEventId": request_event_id.to_string() });
        self.dispatch(
            event_name::UPDATE_COMPLETE,
            event_type::OPTIMIZE,
            event_source::CONTENT_COMPLETE,
            data,
        )
        .await;
    }

    pub async fn dispatch(&self, name: &str, event_type: &str, source: &str, data: Value) {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.hub
            .dispatch(Event::new(name, event_type, source, data))
            .await
            .expect("in-memory hub accepts events");
    }
}

/// Poll `check` until it holds or the wait elapses. Returns the last outcome.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    true
}

/// Offer decisioning proposition with one HTML offer.
pub fn odc_proposition(id: &str, scope: &str) -> Value {
    json!({
        "id": id,
        "scope": scope,
        "activity": { "etag": "8", "id": ODC_ACTIVITY },
        "placement": { "etag": "1", "id": ODC_PLACEMENT },
        "items": [{
            "id": "xcore:personalized-offer:1111111111111111",
            "etag": "10",
            "score": 1,
            "schema": "https://ns.adobe.com/experience/offer-management/content-component-html",
            "data": {
                "id": "xcore:personalized-offer:1111111111111111",
                "format": "text/html",
                "language": ["en-us"],
                "content": "<h1>This is HTML content</h1>",
                "characteristics": { "testing": "true" }
            }
        }]
    })
}

/// Target proposition with a JSON content item and a click metric.
pub fn target_proposition(scope: &str) -> Value {
    json!({
        "id": "AT:eyJhY3Rpdml0eUlkIjoiMTExMTExIiwiZXhwZXJpZW5jZUlkIjoiMCJ9",
        "scope": scope,
        "scopeDetails": {
            "decisionProvider": "TGT",
            "activity": { "id": "111111" },
            "experience": { "id": "0" },
            "strategies": [{ "algorithmID": "0", "trafficType": "0" }],
            "characteristics": { "eventToken": "abc" }
        },
        "items": [
            {
                "id": "0",
                "schema": "https://ns.adobe.com/personalization/json-content-item",
                "data": {
                    "id": "0",
                    "format": "application/json",
                    "content": { "device": "mobile" }
                }
            },
            {
                "id": "111111",
                "data": { "type": "click", "format": "application/vnd.adobe.target.metric" }
            }
        ]
    })
}
