//! Proposition resolution orchestrator.
//!
//! `OptimizeExtension` owns a single worker task. Update and track calls,
//! configuration changes and inbound hub events are all queued to that task,
//! so pending-request bookkeeping is never touched concurrently and a reset
//! always lands after the merges queued before it. Reads go straight to the
//! shared [`PropositionCache`].
//!
//! Hosts can also drive the extension with Optimize request-content events
//! carrying a `requesttype` of update, get or track. Record events the
//! extension dispatches itself on that type and source are recognized by id
//! and not handled again.
//!
//! Update lifecycle:
//! 1. Drop invalid scopes and dispatch the Optimize request record
//! 2. Fail fast when no scope is left or no edge configuration is present
//! 3. Dispatch the edge request and register it under the event id
//! 4. Accumulate decisions and errors that name the event id
//! 5. On completion merge into the cache, notify, and answer the caller
//! 6. Otherwise the deadline answers the caller with a timeout

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use optimize_domain::{
    DecisionScope, DomainError, InteractionKind, InteractionXdm, Offer, OptimizeProposition,
};
use optimize_shared::{
    event_name, event_source, event_type, EdgeErrorResponse, EdgeRequest, Event, OptimizeError,
    OptimizeRequest, PersonalizationResponse, PropositionsNotification, PropositionsResponse,
    RequestType, UpdateComplete, UpstreamError,
};

use crate::cache::PropositionCache;
use crate::config::{OptimizeConfig, EDGE_CONFIG_ID_KEY};
use crate::correlator::{PendingUpdates, UpdateResult};
use crate::ports::{EventHandler, EventHub};

/// Events queued to the worker.
const WORKER_EVENTS: [(&str, &str); 5] = [
    (event_type::EDGE, event_source::PERSONALIZATION_DECISIONS),
    (event_type::EDGE, event_source::ERROR_RESPONSE_CONTENT),
    (event_type::OPTIMIZE, event_source::CONTENT_COMPLETE),
    (event_type::OPTIMIZE, event_source::REQUEST_CONTENT),
    (event_type::CONFIGURATION, event_source::RESPONSE_CONTENT),
];

/// Events that wipe the cache. Queued to the worker like the others.
const RESET_EVENTS: [(&str, &str); 2] = [
    (event_type::GENERIC_IDENTITY, event_source::REQUEST_RESET),
    (event_type::OPTIMIZE, event_source::REQUEST_RESET),
];

enum Command {
    Update {
        scopes: Vec<DecisionScope>,
        xdm: Option<Map<String, Value>>,
        data: Option<Map<String, Value>>,
        reply: oneshot::Sender<UpdateResult>,
    },
    Track {
        interaction: InteractionXdm,
        reply: oneshot::Sender<Result<(), OptimizeError>>,
    },
    Configure(OptimizeConfig),
    Inbound(Event),
    Shutdown,
}

/// Resolves, caches and tracks propositions through a host event hub.
pub struct OptimizeExtension {
    commands: mpsc::UnboundedSender<Command>,
    cache: Arc<PropositionCache>,
    worker: JoinHandle<()>,
}

impl OptimizeExtension {
    /// Subscribe to the hub and start the worker task.
    pub async fn start(
        hub: Arc<dyn EventHub>,
        cache: Arc<PropositionCache>,
        config: OptimizeConfig,
    ) -> Result<Self, OptimizeError> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();

        for (event_type, source) in WORKER_EVENTS.into_iter().chain(RESET_EVENTS) {
            hub.subscribe(event_type, source, forward_to(commands_tx.clone()))
                .await?;
        }

        tracing::info!(
            configured = config.is_configured(),
            "Starting Optimize extension"
        );

        let worker = Worker {
            hub,
            cache: Arc::clone(&cache),
            config,
            pending: PendingUpdates::new(expired_tx),
            own_records: HashSet::new(),
        };
        let worker = tokio::spawn(worker.run(commands_rx, expired_rx));

        Ok(Self {
            commands: commands_tx,
            cache,
            worker,
        })
    }

    /// Fetch propositions for `scopes` from the edge and cache them.
    ///
    /// Resolves with the propositions returned for the requested scopes once
    /// the request completes, or with the error that ended it.
    ///
    /// # Errors
    ///
    /// - `InvalidScope` when no requested scope is valid
    /// - `ConfigurationMissing` when no edge configuration id is set
    /// - `Upstream` when the edge reported an error
    /// - `Timeout` when no completion arrived before the deadline
    pub async fn update_propositions(
        &self,
        scopes: Vec<DecisionScope>,
        xdm: Option<Map<String, Value>>,
        data: Option<Map<String, Value>>,
    ) -> UpdateResult {
        let (reply, response) = oneshot::channel();
        self.send(Command::Update {
            scopes,
            xdm,
            data,
            reply,
        })?;
        response.await.map_err(|_| OptimizeError::Cancelled)?
    }

    /// Cached propositions for `scopes`. Scopes never resolved are left out.
    pub fn get_propositions(
        &self,
        scopes: &[DecisionScope],
    ) -> HashMap<DecisionScope, OptimizeProposition> {
        self.cache.get_many(scopes)
    }

    /// Report an interaction with `offer`, which must belong to `proposition`.
    pub async fn track_interaction(
        &self,
        proposition: &OptimizeProposition,
        offer: &Offer,
        kind: InteractionKind,
    ) -> Result<(), OptimizeError> {
        let interaction = InteractionXdm::for_offer(kind, proposition, offer)?;
        let (reply, response) = oneshot::channel();
        self.send(Command::Track { interaction, reply })?;
        response.await.map_err(|_| OptimizeError::Cancelled)?
    }

    /// Report that `offer` was displayed. Its proposition is looked up in the cache.
    pub async fn offer_displayed(&self, offer: &Offer) -> Result<(), OptimizeError> {
        let proposition = self.owning_proposition(offer)?;
        self.track_interaction(&proposition, offer, InteractionKind::Display)
            .await
    }

    /// Report that `offer` was tapped. Its proposition is looked up in the cache.
    pub async fn offer_tapped(&self, offer: &Offer) -> Result<(), OptimizeError> {
        let proposition = self.owning_proposition(offer)?;
        self.track_interaction(&proposition, offer, InteractionKind::Tap)
            .await
    }

    /// Remove every cached proposition.
    pub fn clear_cache(&self) {
        let removed = self.cache.clear();
        tracing::info!(removed, "Cleared proposition cache");
    }

    /// Replace the configuration used for subsequent requests.
    pub fn update_configuration(&self, config: OptimizeConfig) -> Result<(), OptimizeError> {
        self.send(Command::Configure(config))
    }

    pub fn cache(&self) -> &Arc<PropositionCache> {
        &self.cache
    }

    /// Stop the worker. Pending requests resolve with `Cancelled`.
    pub fn shutdown(&self) {
        if self.send(Command::Shutdown).is_err() {
            tracing::debug!("Optimize extension already stopped");
        }
    }

    fn owning_proposition(&self, offer: &Offer) -> Result<OptimizeProposition, OptimizeError> {
        self.cache
            .find_by_proposition_id(offer.proposition_id())
            .ok_or_else(|| {
                OptimizeError::Domain(DomainError::validation(format!(
                    "No cached proposition {} for offer {}",
                    offer.proposition_id(),
                    offer.id()
                )))
            })
    }

    fn send(&self, command: Command) -> Result<(), OptimizeError> {
        self.commands
            .send(command)
            .map_err(|_| OptimizeError::Cancelled)
    }
}

impl Drop for OptimizeExtension {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Await `future` for at most `timeout`.
///
/// # Errors
///
/// Returns `OptimizeError::Timeout` when the wait is exceeded, otherwise the
/// future's own result.
pub async fn wait_for<T, F>(future: F, timeout: Duration) -> Result<T, OptimizeError>
where
    F: Future<Output = Result<T, OptimizeError>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| OptimizeError::Timeout(timeout))?
}

fn forward_to(commands: mpsc::UnboundedSender<Command>) -> EventHandler {
    Arc::new(move |event: Event| {
        if commands.send(Command::Inbound(event)).is_err() {
            tracing::debug!("Optimize extension stopped, dropping inbound event");
        }
    })
}

fn request_event_id(raw: Option<&str>) -> Option<Uuid> {
    raw.and_then(|id| Uuid::parse_str(id).ok())
}

// =============================================================================
// Worker
// =============================================================================

struct Worker {
    hub: Arc<dyn EventHub>,
    cache: Arc<PropositionCache>,
    config: OptimizeConfig,
    pending: PendingUpdates,
    /// Ids of record events dispatched here and not yet seen coming back.
    own_records: HashSet<Uuid>,
}

impl Worker {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut expired: mpsc::UnboundedReceiver<Uuid>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command).await,
                },
                Some(id) = expired.recv() => {
                    self.pending.expire(&id);
                }
            }
        }

        let dropped = self.pending.clear();
        tracing::info!(dropped, "Optimize extension stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Update {
                scopes,
                xdm,
                data,
                reply,
            } => self.update(scopes, xdm, data, reply).await,
            Command::Track { interaction, reply } => {
                let result = self.track(interaction).await;
                let _ = reply.send(result);
            }
            Command::Configure(config) => self.configure(config),
            Command::Inbound(event) => self.on_event(event).await,
            Command::Shutdown => {}
        }
    }

    async fn update(
        &mut self,
        scopes: Vec<DecisionScope>,
        xdm: Option<Map<String, Value>>,
        data: Option<Map<String, Value>>,
        reply: oneshot::Sender<UpdateResult>,
    ) {
        let requested = scopes.len();
        let valid = valid_scopes(scopes);

        let record = OptimizeRequest::update(valid.clone(), xdm.clone(), data.clone());
        self.dispatch_record(event_name::UPDATE_PROPOSITIONS_REQUEST, &record)
            .await;

        self.request_update(requested, valid, xdm, data, reply).await;
    }

    /// Send the edge request for already validated scopes and register it.
    async fn request_update(
        &mut self,
        requested: usize,
        valid: Vec<DecisionScope>,
        xdm: Option<Map<String, Value>>,
        data: Option<Map<String, Value>>,
        reply: oneshot::Sender<UpdateResult>,
    ) {
        if valid.is_empty() {
            let _ = reply.send(Err(OptimizeError::InvalidScope(format!(
                "none of the {requested} requested decision scopes is valid"
            ))));
            return;
        }
        if !self.config.is_configured() {
            tracing::warn!("Missing edge configuration, not sending personalization request");
            let _ = reply.send(Err(OptimizeError::ConfigurationMissing(
                EDGE_CONFIG_ID_KEY.to_string(),
            )));
            return;
        }

        let request =
            EdgeRequest::personalization(&valid, xdm, data, self.config.dataset_id.clone());
        let event = match Event::with_payload(
            event_name::EDGE_PERSONALIZATION_REQUEST,
            event_type::EDGE,
            event_source::REQUEST_CONTENT,
            &request,
        ) {
            Ok(event) => event,
            Err(e) => {
                let _ = reply.send(Err(OptimizeError::Dispatch(e.to_string())));
                return;
            }
        };

        let id = event.id;
        let scope_count = valid.len();
        self.pending.register(
            id,
            valid,
            Box::new(move |result| {
                if reply.send(result).is_err() {
                    tracing::debug!(request_event_id = %id, "Update caller went away");
                }
            }),
        );

        tracing::info!(
            request_event_id = %id,
            scope_count,
            "Dispatching personalization request"
        );
        if let Err(e) = self.hub.dispatch(event).await {
            tracing::error!(request_event_id = %id, error = %e, "Failed to dispatch personalization request");
            self.pending.fail(&id, e.into());
        }
    }

    async fn track(&mut self, interaction: InteractionXdm) -> Result<(), OptimizeError> {
        let record = OptimizeRequest::track(interaction.clone());
        self.dispatch_record(event_name::TRACK_PROPOSITIONS_REQUEST, &record)
            .await;

        self.send_interaction(interaction).await
    }

    async fn send_interaction(&self, interaction: InteractionXdm) -> Result<(), OptimizeError> {
        if !self.config.is_configured() {
            tracing::warn!("Missing edge configuration, not sending interaction");
            return Err(OptimizeError::ConfigurationMissing(
                EDGE_CONFIG_ID_KEY.to_string(),
            ));
        }

        let request = EdgeRequest::interaction(&interaction, self.config.dataset_id.clone())
            .map_err(|e| OptimizeError::Dispatch(e.to_string()))?;
        let event = Event::with_payload(
            event_name::EDGE_INTERACTION_REQUEST,
            event_type::EDGE,
            event_source::REQUEST_CONTENT,
            &request,
        )
        .map_err(|e| OptimizeError::Dispatch(e.to_string()))?;

        tracing::info!(
            event_id = %event.id,
            event_type = %interaction.event_type,
            "Dispatching proposition interaction"
        );
        self.hub.dispatch(event).await?;
        Ok(())
    }

    fn configure(&mut self, config: OptimizeConfig) {
        tracing::info!(
            configured = config.is_configured(),
            dataset = config.dataset_id.is_some(),
            "Configuration updated"
        );
        self.config = config;
    }

    async fn on_event(&mut self, event: Event) {
        if event.is(event_type::EDGE, event_source::PERSONALIZATION_DECISIONS) {
            self.on_decisions(&event);
        } else if event.is(event_type::EDGE, event_source::ERROR_RESPONSE_CONTENT) {
            self.on_error_response(&event);
        } else if event.is(event_type::OPTIMIZE, event_source::CONTENT_COMPLETE) {
            self.on_complete(&event).await;
        } else if event.is(event_type::OPTIMIZE, event_source::REQUEST_CONTENT) {
            self.on_request(&event).await;
        } else if event.is(event_type::CONFIGURATION, event_source::RESPONSE_CONTENT) {
            self.configure(OptimizeConfig::from_map(&event.data));
        } else if RESET_EVENTS
            .iter()
            .any(|(event_type, source)| event.is(event_type, source))
        {
            let removed = self.cache.clear();
            tracing::info!(event_name = %event.name, removed, "Cleared proposition cache on reset");
        } else {
            tracing::debug!(event_name = %event.name, "Ignoring unexpected event");
        }
    }

    fn on_decisions(&mut self, event: &Event) {
        let response: PersonalizationResponse = match event.response() {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring personalization response");
                return;
            }
        };
        let Some(id) = request_event_id(response.request_event_id.as_deref()) else {
            tracing::debug!(event_id = %event.id, "Personalization response without request id");
            return;
        };
        if !self.pending.contains(&id) {
            tracing::debug!(request_event_id = %id, "Personalization response for untracked request");
            return;
        }

        self.pending.accumulate(&id, response.propositions());
    }

    fn on_error_response(&mut self, event: &Event) {
        let response: EdgeErrorResponse = match event.response() {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring error response");
                return;
            }
        };
        let Some(id) = request_event_id(response.request_event_id.as_deref()) else {
            tracing::debug!(event_id = %event.id, "Error response without request id");
            return;
        };

        let error = response
            .errors
            .into_iter()
            .next()
            .unwrap_or_else(UpstreamError::unexpected);
        self.pending.record_error(&id, error);
    }

    async fn on_complete(&mut self, event: &Event) {
        let complete: UpdateComplete = match event.response() {
            Ok(complete) => complete,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring completion event");
                return;
            }
        };
        let Ok(id) = Uuid::parse_str(&complete.completed_update_request_for_event_id) else {
            tracing::debug!(event_id = %event.id, "Completion without a valid request id");
            return;
        };
        let Some(resolved) = self.pending.resolve(&id) else {
            return;
        };

        let merged: Vec<OptimizeProposition> = resolved.propositions.values().cloned().collect();
        if !merged.is_empty() {
            self.cache.merge(merged.iter().cloned());
            let notification = PropositionsNotification::new(&merged);
            if let Err(e) = self
                .dispatch_payload(
                    event_name::PERSONALIZATION_NOTIFICATION,
                    event_type::OPTIMIZE,
                    event_source::NOTIFICATION,
                    &notification,
                )
                .await
            {
                tracing::warn!(request_event_id = %id, error = %e, "Failed to dispatch proposition notification");
            }
        }

        tracing::info!(
            request_event_id = %id,
            merged = merged.len(),
            "Completed update request"
        );
        resolved.complete();
    }

    /// Dispatch the Optimize request record. Failures are logged only.
    async fn dispatch_record(&mut self, name: &str, record: &OptimizeRequest) {
        let event = match Event::with_payload(
            name,
            event_type::OPTIMIZE,
            event_source::REQUEST_CONTENT,
            record,
        ) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build Optimize request record");
                return;
            }
        };

        let id = event.id;
        self.own_records.insert(id);
        if let Err(e) = self.hub.dispatch(event).await {
            self.own_records.remove(&id);
            tracing::warn!(error = %e, "Failed to dispatch Optimize request record");
        }
    }

    /// Handle an Optimize request dispatched by the host.
    async fn on_request(&mut self, event: &Event) {
        if self.own_records.remove(&event.id) {
            return;
        }
        if event.data.is_empty() {
            tracing::debug!(event_id = %event.id, "Ignoring Optimize request without data");
            return;
        }
        let request: OptimizeRequest = match event.payload() {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(event_id = %event.id, error = %e, "Ignoring malformed Optimize request");
                return;
            }
        };

        tracing::debug!(event_id = %event.id, request_type = ?request.request_type, "Handling Optimize request");
        match request.request_type {
            RequestType::UpdatePropositions => {
                let scopes = request.decision_scopes.unwrap_or_default();
                let requested = scopes.len();
                // Hosts observe the outcome through notifications, not a reply.
                let (reply, _) = oneshot::channel();
                self.request_update(
                    requested,
                    valid_scopes(scopes),
                    request.xdm,
                    request.data,
                    reply,
                )
                .await;
            }
            RequestType::GetPropositions => {
                let scopes = valid_scopes(request.decision_scopes.unwrap_or_default());
                let found = self.cache.get_many(&scopes);
                let response = PropositionsResponse::new(event.id, found.values());
                if let Err(e) = self
                    .dispatch_payload(
                        event_name::GET_PROPOSITIONS_RESPONSE,
                        event_type::OPTIMIZE,
                        event_source::RESPONSE_CONTENT,
                        &response,
                    )
                    .await
                {
                    tracing::warn!(event_id = %event.id, error = %e, "Failed to answer get propositions request");
                }
            }
            RequestType::TrackPropositions => {
                let Some(interaction) = request.proposition_interactions else {
                    tracing::warn!(event_id = %event.id, "Track request without proposition interactions");
                    return;
                };
                if let Err(e) = self.send_interaction(interaction).await {
                    tracing::warn!(event_id = %event.id, error = %e, "Failed to track propositions");
                }
            }
        }
    }

    async fn dispatch_payload<T: Serialize>(
        &self,
        name: &str,
        event_type: &str,
        source: &str,
        payload: &T,
    ) -> Result<Uuid, OptimizeError> {
        let event = Event::with_payload(name, event_type, source, payload)
            .map_err(|e| OptimizeError::Dispatch(e.to_string()))?;
        Ok(self.hub.dispatch(event).await?)
    }
}

/// Keep valid scopes in request order, without duplicates.
fn valid_scopes(scopes: Vec<DecisionScope>) -> Vec<DecisionScope> {
    let mut seen = HashSet::new();
    scopes
        .into_iter()
        .filter(|scope| match scope.validate() {
            Ok(()) => seen.insert(scope.clone()),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping invalid decision scope");
                false
            }
        })
        .collect()
}
