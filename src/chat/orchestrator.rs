//! Chat orchestrator - main coordinator
//!
//! Owns the active model set and the conversation store, and drives one
//! request task per active model per submitted message. Tasks run in
//! parallel: a slow or stalled provider never delays fragment delivery
//! for other models, and one model's failure never cancels, corrupts, or
//! delays another's task.
//!
//! Per submit: the user turn is appended to every active model's
//! conversation up front, so all models see identical context even if
//! some later fail; then each model's history is trimmed to the token
//! limit, its adapter is invoked, and its fragments are pushed to the
//! presentation channel as they arrive while being reassembled into the
//! stored assistant turn.

use crate::chat::events::{ChatEvent, ChatEventBus};
use crate::chat::state::{PhaseEvent, RequestPhase};
use crate::chat::store::ConversationStore;
use crate::context::{HistoryBudgeter, TokenCounter};
use crate::errors::{ChatError, Result};
use crate::streaming::ProviderAdapter;
use crate::types::{ModelCatalog, ModelDescriptor, ProviderKind, Turn};
use futures_util::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Multi-provider streaming chat orchestrator
pub struct ChatOrchestrator {
    /// Static model table
    catalog: ModelCatalog,

    /// One adapter per wire protocol family
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,

    /// Conversation history, shared with in-flight request tasks
    store: Arc<RwLock<ConversationStore>>,

    /// Shared token counting scheme
    budgeter: HistoryBudgeter,

    /// Currently selected model ids
    active: HashSet<String>,

    /// Presentation event channel
    bus: ChatEventBus,

    /// Cancellation handle per model with a request in flight
    inflight: HashMap<String, CancellationToken>,

    /// Handles of spawned request tasks, drained by `wait_idle`
    handles: Vec<JoinHandle<()>>,
}

impl ChatOrchestrator {
    /// Create an orchestrator over a catalog and one adapter per protocol
    ///
    /// Returns the receiving end of the presentation event channel
    /// alongside the orchestrator.
    pub fn new(
        catalog: ModelCatalog,
        completion: Arc<dyn ProviderAdapter>,
        event_stream: Arc<dyn ProviderAdapter>,
    ) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (bus, receiver) = ChatEventBus::new();

        let mut adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>> = HashMap::new();
        adapters.insert(ProviderKind::Completion, completion);
        adapters.insert(ProviderKind::EventStream, event_stream);

        let orchestrator = Self {
            catalog,
            adapters,
            store: Arc::new(RwLock::new(ConversationStore::new())),
            budgeter: HistoryBudgeter::new(TokenCounter::new()),
            active: HashSet::new(),
            bus,
            inflight: HashMap::new(),
            handles: Vec::new(),
        };

        (orchestrator, receiver)
    }

    /// Add a model to the active selection set
    ///
    /// Fails fast with `UnknownModel` for ids absent from the catalog.
    pub fn select(&mut self, model_id: &str) -> Result<()> {
        self.catalog.get(model_id)?;
        self.active.insert(model_id.to_string());
        Ok(())
    }

    /// Remove a model from the active selection set
    pub fn deselect(&mut self, model_id: &str) {
        self.active.remove(model_id);
    }

    /// Currently selected model ids, sorted for stable presentation
    pub fn active_models(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Submit a user message to every active model
    ///
    /// Appends the user turn to each active model's conversation up
    /// front, then spawns one independent request task per model. Returns
    /// the request id correlating this cycle's events; with an empty
    /// selection the submit is a no-op.
    pub fn submit(
        &mut self,
        user_text: &str,
        system_prompt: Option<&str>,
        token_limit: u32,
    ) -> Uuid {
        let request_id = Uuid::new_v4();
        let targets = self.active_models();

        {
            let mut store = write_lock(&self.store);
            for model_id in &targets {
                store.append(model_id, Turn::user(user_text));
            }
        }

        tracing::debug!(
            %request_id,
            models = targets.len(),
            token_limit,
            "submitting user message"
        );

        for model_id in targets {
            // Catalog membership was checked at selection time
            let descriptor = match self.catalog.get(&model_id) {
                Ok(d) => d.clone(),
                Err(_) => continue,
            };
            let adapter = match self.adapters.get(&descriptor.provider_kind) {
                Some(a) => Arc::clone(a),
                None => continue,
            };

            let cancel = CancellationToken::new();
            // At most one task mutates a model's sequence at a time: a
            // resubmit while a request is still in flight supersedes it
            if let Some(previous) = self.inflight.insert(model_id.clone(), cancel.clone()) {
                previous.cancel();
            }

            let store = Arc::clone(&self.store);
            let budgeter = self.budgeter;
            let bus = self.bus.clone();
            let system_prompt = system_prompt.map(|p| p.to_string());

            let handle = tokio::spawn(async move {
                Self::run_model_request(
                    descriptor,
                    adapter,
                    store,
                    budgeter,
                    bus,
                    request_id,
                    system_prompt,
                    token_limit,
                    cancel,
                )
                .await;
            });
            self.handles.push(handle);
        }

        request_id
    }

    /// Clear one model's conversation
    ///
    /// Cancels any in-flight request for that model first, so partial
    /// output is discarded without a partial assistant turn. Other
    /// models' tasks are unaffected.
    pub fn clear(&mut self, model_id: &str) {
        if let Some(cancel) = self.inflight.remove(model_id) {
            cancel.cancel();
        }
        write_lock(&self.store).clear(model_id);
    }

    /// Clear every model's conversation and cancel all in-flight requests
    pub fn clear_all(&mut self) {
        for (_, cancel) in self.inflight.drain() {
            cancel.cancel();
        }
        write_lock(&self.store).clear_all();
    }

    /// Stop consuming all in-flight streams without touching stored history
    pub fn shutdown(&mut self) {
        for (_, cancel) in self.inflight.drain() {
            cancel.cancel();
        }
    }

    /// Wait for every spawned request task to finish
    pub async fn wait_idle(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }

    /// Snapshot of one model's conversation
    pub fn history(&self, model_id: &str) -> Vec<Turn> {
        read_lock(&self.store).get(model_id)
    }

    /// Reported token cost per active model, sorted by id
    pub fn token_counts(&self) -> Vec<(String, usize)> {
        let store = read_lock(&self.store);
        self.active_models()
            .into_iter()
            .map(|id| {
                let cost = store.cost(&id, &self.budgeter);
                (id, cost)
            })
            .collect()
    }

    /// Drive one model's request task end to end
    #[allow(clippy::too_many_arguments)]
    async fn run_model_request(
        descriptor: ModelDescriptor,
        adapter: Arc<dyn ProviderAdapter>,
        store: Arc<RwLock<ConversationStore>>,
        budgeter: HistoryBudgeter,
        bus: ChatEventBus,
        request_id: Uuid,
        system_prompt: Option<String>,
        token_limit: u32,
        cancel: CancellationToken,
    ) {
        let model_id = descriptor.id.clone();
        let outcome = Self::drive(
            &descriptor,
            adapter,
            &store,
            budgeter,
            &bus,
            request_id,
            system_prompt,
            token_limit,
            &cancel,
        )
        .await;

        match outcome {
            Ok(Some(_reply)) => {
                bus.emit(ChatEvent::Completed {
                    request_id,
                    model_id,
                })
                .await;
            }
            Ok(None) => {
                tracing::debug!(model = %model_id, "request cancelled, partial output discarded");
            }
            Err(err) => {
                tracing::error!(model = %model_id, error = %err, "request failed");
                bus.emit(ChatEvent::Failed {
                    request_id,
                    model_id,
                    detail: err.to_string(),
                })
                .await;
            }
        }
    }

    /// Budget, dispatch, and consume one model's fragment stream
    ///
    /// Returns the assembled reply, or `None` when the request was
    /// cancelled before completing.
    #[allow(clippy::too_many_arguments)]
    async fn drive(
        descriptor: &ModelDescriptor,
        adapter: Arc<dyn ProviderAdapter>,
        store: &Arc<RwLock<ConversationStore>>,
        budgeter: HistoryBudgeter,
        bus: &ChatEventBus,
        request_id: Uuid,
        system_prompt: Option<String>,
        token_limit: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let model_id = &descriptor.id;
        let mut phase = Self::advance(model_id, RequestPhase::Idle, PhaseEvent::Submit)?;

        // Truncate before building the request; the snapshot taken here is
        // what this request sees even if other models mutate their own
        // sequences concurrently
        let history = {
            let mut store = write_lock(store);
            store.enforce_budget(model_id, &budgeter, token_limit);
            store.get(model_id)
        };

        let opened = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            opened = adapter.stream(
                descriptor,
                system_prompt.as_deref(),
                &history,
                token_limit,
            ) => opened,
        };

        let mut fragments = match opened {
            Ok(stream) => stream,
            Err(source) => {
                Self::advance(model_id, phase, PhaseEvent::StreamError)?;
                return Err(ChatError::Provider {
                    model: model_id.clone(),
                    source,
                });
            }
        };
        phase = Self::advance(model_id, phase, PhaseEvent::StreamOpened)?;

        let mut reply = String::new();
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                next = fragments.next() => next,
            };

            match next {
                Some(Ok(fragment)) => {
                    reply.push_str(&fragment.text);
                    bus.emit(ChatEvent::Fragment {
                        request_id,
                        model_id: model_id.clone(),
                        text: fragment.text,
                    })
                    .await;
                }
                Some(Err(source)) => {
                    Self::advance(model_id, phase, PhaseEvent::StreamError)?;
                    return Err(ChatError::Provider {
                        model: model_id.clone(),
                        source,
                    });
                }
                None => break,
            }
        }
        Self::advance(model_id, phase, PhaseEvent::StreamExhausted)?;

        {
            let mut store = write_lock(store);
            // A clear that raced with stream completion wins: nothing is
            // appended into a conversation that was just wiped
            if cancel.is_cancelled() {
                return Ok(None);
            }
            store.append(model_id, Turn::assistant(reply.clone()));
        }

        Ok(Some(reply))
    }

    /// Apply and log one phase transition
    fn advance(model_id: &str, phase: RequestPhase, event: PhaseEvent) -> Result<RequestPhase> {
        let next = phase.transition(event)?;
        tracing::debug!(model = %model_id, from = %phase, to = %next, "request phase transition");
        Ok(next)
    }
}

/// Acquire a write guard, recovering the data from a poisoned lock
fn write_lock(store: &Arc<RwLock<ConversationStore>>) -> RwLockWriteGuard<'_, ConversationStore> {
    store.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Acquire a read guard, recovering the data from a poisoned lock
fn read_lock(store: &Arc<RwLock<ConversationStore>>) -> RwLockReadGuard<'_, ConversationStore> {
    store.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}
