//! Optimize Engine - demo entry point.
//!
//! Runs one update round trip and one display notification against an
//! in-process hub, with a simulated edge answering personalization requests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use optimize_domain::DecisionScope;
use optimize_engine::{
    wait_for, EventHub, InMemoryEventHub, OptimizeConfig, OptimizeExtension, PropositionCache,
};
use optimize_shared::{
    event_name, event_source, event_type, EdgeRequest, Event, PersonalizationResponse,
    UpdateComplete,
};

const DEMO_ACTIVITY: &str = "xcore:offer-activity:1111111111111111";
const DEMO_PLACEMENT: &str = "xcore:offer-placement:1111111111111111";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "optimize_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Optimize Engine demo");

    let mut config = OptimizeConfig::from_env();
    if !config.is_configured() {
        tracing::warn!("OPTIMIZE_EDGE_CONFIG_ID not set, using a placeholder edge configuration");
        config.edge_config_id = Some("demo-edge-config".into());
    }

    let hub = InMemoryEventHub::new();
    simulate_edge(&hub).await?;

    let cache = Arc::new(PropositionCache::new());
    let extension = OptimizeExtension::start(Arc::new(hub.clone()), cache, config).await?;

    let scope = DecisionScope::from_activity(DEMO_ACTIVITY, DEMO_PLACEMENT, None);
    let propositions = wait_for(
        extension.update_propositions(vec![scope.clone(), DecisionScope::new("myMbox")], None, None),
        Duration::from_secs(5),
    )
    .await?;

    for (scope, proposition) in &propositions {
        tracing::info!(
            scope = %scope,
            proposition_id = %proposition.id(),
            offers = proposition.offers().len(),
            "Resolved proposition"
        );
    }

    if let Some(offer) = propositions
        .get(&scope)
        .and_then(|proposition| proposition.offers().first())
    {
        extension.offer_displayed(offer).await?;
        tracing::info!(offer_id = %offer.id(), "Reported offer display");
    }

    extension.shutdown();
    Ok(())
}

/// Answer every personalization request on the hub with one text offer per
/// scope, followed by the completion signal.
async fn simulate_edge(hub: &InMemoryEventHub) -> anyhow::Result<()> {
    let responder = hub.clone();
    hub.subscribe(
        event_type::EDGE,
        event_source::REQUEST_CONTENT,
        Arc::new(move |event: Event| {
            let Ok(request) = event.payload::<EdgeRequest>() else {
                return;
            };
            if request.query.is_none() {
                return;
            }

            let payload = request
                .scope_names()
                .iter()
                .enumerate()
                .map(|(n, scope)| {
                    json!({
                        "id": format!("demo-proposition-{n}"),
                        "scope": scope,
                        "items": [{
                            "id": format!("demo-offer-{n}"),
                            "schema": "https://ns.adobe.com/experience/offer-management/content-component-text",
                            "data": { "format": "text/plain", "content": format!("Offer for {scope}") }
                        }]
                    })
                })
                .collect();
            let response = PersonalizationResponse {
                payload,
                request_event_id: Some(event.id.to_string()),
                request_id: None,
                response_type: Some(event_source::PERSONALIZATION_DECISIONS.to_string()),
            };
            let complete = UpdateComplete {
                completed_update_request_for_event_id: event.id.to_string(),
            };

            let hub = responder.clone();
            tokio::spawn(async move {
                let events = [
                    Event::with_payload(
                        "AEP Response Event Handle",
                        event_type::EDGE,
                        event_source::PERSONALIZATION_DECISIONS,
                        &response,
                    ),
                    Event::with_payload(
                        event_name::UPDATE_COMPLETE,
                        event_type::OPTIMIZE,
                        event_source::CONTENT_COMPLETE,
                        &complete,
                    ),
                ];
                for event in events {
                    match event {
                        Ok(event) => {
                            if let Err(e) = hub.dispatch(event).await {
                                tracing::error!(error = %e, "Simulated edge failed to respond");
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "Simulated edge built a bad event"),
                    }
                }
            });
        }),
    )
    .await?;
    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
