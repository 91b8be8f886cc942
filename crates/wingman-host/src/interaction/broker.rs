//! The human interaction broker.
//!
//! This is the correlation core of the host: it issues interaction requests
//! to the UI as stream events, parks the suspended engine call in a pending
//! table keyed by a generated request id, and settles exactly one
//! continuation when a response, a task abort, or a bulk reject arrives.
//!
//! The UI's response path is not always given the broker-generated request
//! id: for some interaction kinds it only knows the id of the tool
//! invocation that preceded the request. The broker therefore keeps a
//! secondary index from tool id to request id and resolves by whichever
//! identifier it is handed. The tool id is announced (via the stream) before
//! the structured request is issued, and the two events are not atomic from
//! the engine's perspective, so the most recent announced tool id sits in a
//! single slot until the next `request` consumes it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use wingman_core::error::{Result, WingmanError};
use wingman_core::interaction::{HelpKind, HumanInteractionRequest, InteractKind};
use wingman_core::stream::{HostEvent, StreamMessage};
use wingman_core::ui::EventSink;

/// Message used when the UI reports a failed interaction without one.
const DEFAULT_FAILURE_MESSAGE: &str = "Human interaction failed";

/// Kind-specific request content, built by the stream relay from the engine
/// callback that is suspending.
#[derive(Debug, Clone)]
pub struct InteractionPayload {
    pub agent_name: String,
    pub kind: InteractKind,
    pub prompt: String,
    pub options: Option<Vec<String>>,
    pub multiple: Option<bool>,
    pub help_kind: Option<HelpKind>,
    pub page_url: Option<String>,
}

impl InteractionPayload {
    pub fn confirm(agent_name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::bare(agent_name, InteractKind::Confirm, prompt)
    }

    pub fn input(agent_name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::bare(agent_name, InteractKind::Input, prompt)
    }

    pub fn select(
        agent_name: impl Into<String>,
        prompt: impl Into<String>,
        options: Vec<String>,
        multiple: bool,
    ) -> Self {
        let mut payload = Self::bare(agent_name, InteractKind::Select, prompt);
        payload.options = Some(options);
        payload.multiple = Some(multiple);
        payload
    }

    pub fn request_help(
        agent_name: impl Into<String>,
        prompt: impl Into<String>,
        help_kind: HelpKind,
        page_url: Option<String>,
    ) -> Self {
        let mut payload = Self::bare(agent_name, InteractKind::RequestHelp, prompt);
        payload.help_kind = Some(help_kind);
        payload.page_url = page_url;
        payload
    }

    fn bare(agent_name: impl Into<String>, kind: InteractKind, prompt: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            kind,
            prompt: prompt.into(),
            options: None,
            multiple: None,
            help_kind: None,
            page_url: None,
        }
    }
}

struct PendingInteraction {
    resolver: oneshot::Sender<Result<Value>>,
    /// Tool correlation id indexed to this request, cleared on any resolution.
    tool_id: Option<String>,
}

#[derive(Default)]
struct BrokerState {
    /// Pending table: request id -> suspended continuation.
    pending: HashMap<String, PendingInteraction>,
    /// Secondary index: tool correlation id -> request id.
    tool_index: HashMap<String, String>,
    /// Most recent announced tool id awaiting consumption by `request`.
    captured_tool_id: Option<String>,
}

/// Tracks pending human interaction requests for one engine instance.
///
/// One broker per engine instance; reload discards the broker together with
/// the engine so stale entries cannot resolve into a dead continuation.
pub struct HumanInteractionBroker {
    state: Mutex<BrokerState>,
    sink: Arc<dyn EventSink>,
}

impl HumanInteractionBroker {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            state: Mutex::new(BrokerState::default()),
            sink,
        }
    }

    /// Issues an interaction request to the UI and suspends until it is
    /// answered, the task is aborted, or the broker is torn down.
    ///
    /// The pending entry is registered before the stream event is sent, so a
    /// response can never arrive for an unregistered request. If an announced
    /// tool id is waiting in the capture slot it is indexed to this request
    /// and the slot is cleared.
    ///
    /// # Errors
    ///
    /// Returns `InteractionAborted` when the owning window is already gone,
    /// when the task's cancellation signal fires mid-wait, or when the
    /// request is bulk-rejected by reload/teardown.
    pub async fn request(
        &self,
        task_id: &str,
        cancellation: &tokio_util::sync::CancellationToken,
        payload: InteractionPayload,
    ) -> Result<Value> {
        if self.sink.is_closed() {
            return Err(WingmanError::aborted(
                "window closed before human interaction could be sent",
            ));
        }

        let request_id = Uuid::new_v4().to_string();
        let (resolver, mut receiver) = oneshot::channel();

        {
            let mut state = self.state.lock().expect("broker lock poisoned");
            let tool_id = state.captured_tool_id.take();
            if let Some(tool_id) = &tool_id {
                state.tool_index.insert(tool_id.clone(), request_id.clone());
            }
            state
                .pending
                .insert(request_id.clone(), PendingInteraction { resolver, tool_id });
        }

        let message = HumanInteractionRequest {
            request_id: request_id.clone(),
            task_id: task_id.to_string(),
            agent_name: payload.agent_name,
            interact_kind: payload.kind,
            prompt: payload.prompt,
            options: payload.options,
            multiple: payload.multiple,
            help_kind: payload.help_kind,
            page_url: payload.page_url,
        };

        if let Err(e) = self.sink.emit(HostEvent::Stream {
            message: StreamMessage::HumanInteractionRequest(message),
        }) {
            self.remove_entry(&request_id);
            return Err(WingmanError::aborted(format!(
                "failed to deliver human interaction request: {e}"
            )));
        }

        debug!(%request_id, %task_id, "human interaction request pending");

        tokio::select! {
            response = &mut receiver => Self::settle(response),
            _ = cancellation.cancelled() => {
                // A concurrent response may have already consumed the entry;
                // in that case the resolver fired and the receiver settles.
                if self.remove_entry(&request_id) {
                    debug!(%request_id, %task_id, "human interaction rejected by task abort");
                    Err(WingmanError::aborted("task aborted during human interaction"))
                } else {
                    Self::settle((&mut receiver).await)
                }
            }
        }
    }

    /// Records the tool id of an announced human-interaction tool invocation,
    /// to be consumed by the next `request`.
    ///
    /// Only one capture may be outstanding; a second capture before
    /// consumption overwrites the first (single-flight per task is assumed).
    pub fn capture_tool_correlation(&self, tool_id: &str) {
        let mut state = self.state.lock().expect("broker lock poisoned");
        if let Some(stale) = state.captured_tool_id.replace(tool_id.to_string()) {
            warn!(%stale, %tool_id, "overwriting unconsumed tool correlation id");
        }
    }

    /// Settles the pending request identified by `correlation_id`, which may
    /// be either a request id or a tool correlation id.
    ///
    /// Returns `false` when no matching entry exists: duplicate and late
    /// responses are expected under races and are not an error. The entry is
    /// removed from both the pending table and the secondary index before
    /// the continuation is settled, guaranteeing at-most-once delivery.
    pub fn resolve(
        &self,
        correlation_id: &str,
        success: bool,
        result: Option<Value>,
        error: Option<String>,
    ) -> bool {
        let (request_id, entry) = {
            let mut state = self.state.lock().expect("broker lock poisoned");

            let request_id = if state.pending.contains_key(correlation_id) {
                correlation_id.to_string()
            } else if let Some(mapped) = state.tool_index.get(correlation_id).cloned() {
                mapped
            } else {
                return false;
            };

            let Some(entry) = state.pending.remove(&request_id) else {
                return false;
            };
            if let Some(tool_id) = &entry.tool_id {
                state.tool_index.remove(tool_id);
            }
            (request_id, entry)
        };

        if success {
            let value = result.unwrap_or(Value::Null);
            if entry.resolver.send(Ok(value.clone())).is_err() {
                warn!(%request_id, "human interaction continuation dropped before resolution");
            }
            // Mark the interaction completed on the UI, independent of
            // whatever consumes the resolved value.
            if let Err(e) = self.sink.emit(HostEvent::Stream {
                message: StreamMessage::HumanInteractionResult {
                    request_id: request_id.clone(),
                    result: value,
                },
            }) {
                warn!(%request_id, error = %e, "failed to deliver human interaction result event");
            }
        } else {
            let message = error.unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
            let _ = entry.resolver.send(Err(WingmanError::internal(message)));
        }

        true
    }

    /// Rejects every pending request with the given reason and clears all
    /// correlation state. No-op when nothing is pending.
    pub fn reject_all(&self, reason: &str) {
        let drained: Vec<(String, PendingInteraction)> = {
            let mut state = self.state.lock().expect("broker lock poisoned");
            state.captured_tool_id = None;
            state.tool_index.clear();
            state.pending.drain().collect()
        };

        if drained.is_empty() {
            return;
        }

        debug!(count = drained.len(), %reason, "rejecting all pending human interactions");
        for (request_id, entry) in drained {
            if entry
                .resolver
                .send(Err(WingmanError::aborted(reason)))
                .is_err()
            {
                warn!(%request_id, "pending human interaction already settled");
            }
        }
    }

    /// Number of requests currently pending.
    pub fn pending_count(&self) -> usize {
        self.state.lock().expect("broker lock poisoned").pending.len()
    }

    /// Removes a pending entry and its index mapping. Returns whether the
    /// entry was still present.
    fn remove_entry(&self, request_id: &str) -> bool {
        let mut state = self.state.lock().expect("broker lock poisoned");
        match state.pending.remove(request_id) {
            Some(entry) => {
                if let Some(tool_id) = &entry.tool_id {
                    state.tool_index.remove(tool_id);
                }
                true
            }
            None => false,
        }
    }

    fn settle(response: std::result::Result<Result<Value>, oneshot::error::RecvError>) -> Result<Value> {
        match response {
            Ok(result) => result,
            // Resolver dropped without settling; only possible if the broker
            // itself was dropped mid-wait.
            Err(_) => Err(WingmanError::aborted("human interaction broker dropped")),
        }
    }
}
