//! The task engine adapter.
//!
//! One `EngineService` per window context. It exclusively owns the window's
//! engine instance, pairs it with the human interaction broker that serves
//! its callbacks, and rebuilds both together whenever configuration changes
//! so no continuation can leak across instances.
//!
//! Error contract: `run`/`modify`/`execute` never propagate engine-internal
//! faults. They are caught at this boundary, reported to the UI as a terminal
//! `error` stream event (with the task id when one exists), and the call
//! returns an empty result. Request/response-only operations (status, cancel,
//! restore, context extraction) reject directly instead.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use wingman_core::config::EngineConfig;
use wingman_core::engine::{AbortResult, EngineFactory, TaskEngine, TaskResult, Workflow};
use wingman_core::error::{Result, WingmanError};
use wingman_core::interaction::HumanResponse;
use wingman_core::stream::{HostEvent, StreamMessage};
use wingman_core::ui::{EventSink, ViewSurface};

use crate::interaction::HumanInteractionBroker;
use crate::stream::StreamRelay;

/// An engine instance and the broker bound to it. Always replaced as a pair.
struct EngineSlot {
    engine: Arc<dyn TaskEngine>,
    broker: Arc<HumanInteractionBroker>,
}

/// Status snapshot of one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub running: bool,
}

/// A task's full conversational state, captured for persistence/resume.
#[derive(Debug, Clone, Serialize)]
pub struct TaskContextSnapshot {
    pub workflow: Workflow,
    /// Variables flattened to a plain key-value mapping.
    pub variables: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_result: Option<String>,
}

/// Owns and drives one window's engine instance.
pub struct EngineService {
    window_id: String,
    sink: Arc<dyn EventSink>,
    secondary: Arc<dyn ViewSurface>,
    factory: Arc<dyn EngineFactory>,
    slot: RwLock<Option<EngineSlot>>,
}

impl EngineService {
    /// Creates the service and its initial engine instance.
    pub async fn initialize(
        window_id: impl Into<String>,
        sink: Arc<dyn EventSink>,
        secondary: Arc<dyn ViewSurface>,
        factory: Arc<dyn EngineFactory>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let service = Arc::new(Self {
            window_id: window_id.into(),
            sink,
            secondary,
            factory,
            slot: RwLock::new(None),
        });

        let slot = service.build_slot(&config);
        *service.slot.write().await = Some(slot);
        info!(window_id = %service.window_id, model = %config.llm.model, "engine service initialized");
        service
    }

    /// Builds a fresh engine instance with a fresh broker and callback wiring.
    fn build_slot(&self, config: &EngineConfig) -> EngineSlot {
        let broker = Arc::new(HumanInteractionBroker::new(self.sink.clone()));
        let relay = Arc::new(StreamRelay::new(
            self.sink.clone(),
            self.secondary.clone(),
            broker.clone(),
        ));
        let engine = self.factory.create(config.clone(), relay);
        EngineSlot { engine, broker }
    }

    async fn engine(&self) -> Option<Arc<dyn TaskEngine>> {
        self.slot.read().await.as_ref().map(|slot| slot.engine.clone())
    }

    /// Starts a new task. Engine faults surface as a terminal error stream
    /// event, never as an `Err` past this boundary.
    pub async fn run(&self, message: &str) -> Result<Option<TaskResult>> {
        let Some(engine) = self.engine().await else {
            self.report_error("Engine not initialized", None);
            return Ok(None);
        };

        match engine.run(message).await {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                error!(window_id = %self.window_id, error = %e, "engine run failed");
                self.report_error(&e.to_string(), None);
                Ok(None)
            }
        }
    }

    /// Updates an existing task's instructions and re-executes it.
    pub async fn modify(&self, task_id: &str, message: &str) -> Result<Option<TaskResult>> {
        let Some(engine) = self.engine().await else {
            self.report_error("Engine not initialized", Some(task_id.to_string()));
            return Ok(None);
        };

        let outcome = async {
            engine.modify(task_id, message).await?;
            engine.execute(task_id).await
        }
        .await;

        match outcome {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                error!(window_id = %self.window_id, %task_id, error = %e, "engine modify failed");
                self.report_error(&e.to_string(), Some(task_id.to_string()));
                Ok(None)
            }
        }
    }

    /// Resumes a previously initialized task (used after restore).
    pub async fn execute(&self, task_id: &str) -> Result<Option<TaskResult>> {
        let Some(engine) = self.engine().await else {
            self.report_error("Engine not initialized", Some(task_id.to_string()));
            return Ok(None);
        };

        match engine.execute(task_id).await {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                error!(window_id = %self.window_id, %task_id, error = %e, "engine execute failed");
                self.report_error(&e.to_string(), Some(task_id.to_string()));
                Ok(None)
            }
        }
    }

    /// Reports whether a task's cancellation signal has fired.
    ///
    /// # Errors
    ///
    /// Rejects with `Uninitialized` when no engine instance exists and
    /// `NotFound` for an unknown task id.
    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        let engine = self.engine().await.ok_or(WingmanError::Uninitialized)?;
        let handle = engine
            .get_task(task_id)
            .ok_or_else(|| WingmanError::not_found("task", task_id))?;
        Ok(TaskStatus {
            task_id: task_id.to_string(),
            running: handle.is_running(),
        })
    }

    /// Cooperatively cancels a task at the user's request.
    pub async fn cancel_task(&self, task_id: &str) -> Result<AbortResult> {
        let engine = self.engine().await.ok_or(WingmanError::Uninitialized)?;
        engine.abort(task_id, "user-cancelled").await
    }

    /// True iff any tracked task has not been aborted yet.
    pub async fn has_running_task(&self) -> bool {
        let Some(engine) = self.engine().await else {
            return false;
        };
        engine
            .all_task_ids()
            .iter()
            .any(|task_id| engine.get_task(task_id).is_some_and(|h| h.is_running()))
    }

    /// Re-hydrates a task from a captured snapshot without re-running the
    /// plan. Prior plan chain data, when supplied, is reattached so a later
    /// modify/replan keeps conversational continuity.
    pub async fn restore_task(
        &self,
        workflow: Workflow,
        variables: Option<HashMap<String, Value>>,
        plan_request: Option<Value>,
        plan_result: Option<String>,
    ) -> Result<String> {
        let engine = self.engine().await.ok_or(WingmanError::Uninitialized)?;
        let handle = engine.init_context(workflow, variables).await?;

        match (plan_request, plan_result) {
            (Some(request), Some(result)) => {
                handle.chain.attach(request, result);
                info!(task_id = %handle.task_id, "task restored with plan chain");
            }
            // The task stays usable without chain data, just without
            // conversational memory for replans.
            _ => warn!(task_id = %handle.task_id, "task restored without plan chain data"),
        }

        Ok(handle.task_id)
    }

    /// Captures a task's full conversational state for persistence.
    pub async fn task_context(&self, task_id: &str) -> Result<TaskContextSnapshot> {
        let engine = self.engine().await.ok_or(WingmanError::Uninitialized)?;
        let handle = engine
            .get_task(task_id)
            .ok_or_else(|| WingmanError::not_found("task", task_id))?;

        Ok(TaskContextSnapshot {
            workflow: handle.workflow.clone(),
            variables: handle.variables.flatten(),
            plan_request: handle.chain.plan_request(),
            plan_result: handle.chain.plan_result(),
        })
    }

    /// Routes a UI human-interaction response to the current broker.
    ///
    /// Returns `Ok(false)` when the response matches no pending request
    /// (already processed or unknown); duplicates are tolerated.
    pub async fn handle_human_response(&self, response: HumanResponse) -> Result<bool> {
        let slot = self.slot.read().await;
        let slot = slot.as_ref().ok_or(WingmanError::Uninitialized)?;
        Ok(slot.broker.resolve(
            &response.request_id,
            response.success,
            response.result,
            response.error,
        ))
    }

    /// Replaces the engine instance after a configuration change.
    ///
    /// Every task the old instance tracks is aborted (per-task failures are
    /// logged and do not block the reload), every pending human interaction
    /// is rejected, and only then is the new instance constructed and the
    /// window notified of the active model/provider.
    pub async fn reload(&self, config: EngineConfig) -> Result<()> {
        info!(window_id = %self.window_id, model = %config.llm.model, "reloading engine configuration");

        let mut slot = self.slot.write().await;
        if let Some(old) = slot.as_ref() {
            for task_id in old.engine.all_task_ids() {
                if let Err(e) = old.engine.abort(&task_id, "config-reload").await {
                    warn!(%task_id, error = %e, "failed to abort task during reload");
                }
            }
            old.broker.reject_all("configuration reloaded");
        }
        *slot = Some(self.build_slot(&config));
        drop(slot);

        if let Err(e) = self.sink.emit(HostEvent::ConfigReloaded {
            model: config.llm.model.clone(),
            provider: config.llm.provider.clone(),
        }) {
            warn!(window_id = %self.window_id, error = %e, "failed to notify window of config reload");
        }
        Ok(())
    }

    /// Tears the service down: aborts all tracked tasks, rejects all pending
    /// human interactions, and discards the engine instance.
    pub async fn shutdown(&self, reason: &str) {
        let Some(slot) = self.slot.write().await.take() else {
            return;
        };
        info!(window_id = %self.window_id, %reason, "shutting down engine service");

        let aborts = slot.engine.all_task_ids().into_iter().map(|task_id| {
            let engine = slot.engine.clone();
            let reason = reason.to_string();
            async move {
                let outcome = engine.abort(&task_id, &reason).await;
                (task_id, outcome)
            }
        });
        for (task_id, outcome) in join_all(aborts).await {
            if let Err(e) = outcome {
                warn!(%task_id, error = %e, "failed to abort task during shutdown");
            }
        }

        slot.broker.reject_all(reason);
    }

    fn report_error(&self, message: &str, task_id: Option<String>) {
        if self.sink.is_closed() {
            warn!(window_id = %self.window_id, "window destroyed, cannot report error");
            return;
        }
        if let Err(e) = self.sink.emit(HostEvent::Stream {
            message: StreamMessage::error(message, task_id),
        }) {
            warn!(window_id = %self.window_id, error = %e, "failed to deliver error event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockConfigStore, MockEngineFactory, MockSink, MockView};
    use wingman_core::config::ConfigStore;
    use wingman_core::stream::StreamMessage;

    async fn service_fixture() -> (
        Arc<EngineService>,
        Arc<MockEngineFactory>,
        Arc<MockSink>,
    ) {
        let sink = Arc::new(MockSink::new());
        let view = Arc::new(MockView::new());
        let factory = Arc::new(MockEngineFactory::new());
        let config_store = MockConfigStore::new();
        let config = EngineConfig {
            llm: config_store.llm_config().await.unwrap(),
            agents: config_store.agent_config().await.unwrap(),
        };
        let service = EngineService::initialize(
            "window-1",
            sink.clone(),
            view,
            factory.clone(),
            config,
        )
        .await;
        (service, factory, sink)
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            llm: wingman_core::config::LlmConfig {
                provider: "anthropic".to_string(),
                model: "claude-test".to_string(),
                api_key: None,
                base_url: None,
            },
            agents: Default::default(),
        }
    }

    /// Suspends one human interaction per task through the engine's callback
    /// and returns the join handles once all requests reached the sink.
    async fn suspend_interactions(
        factory: &Arc<MockEngineFactory>,
        sink: &Arc<MockSink>,
        task_ids: &[&str],
    ) -> Vec<tokio::task::JoinHandle<Result<bool>>> {
        let engine = factory.latest();
        let before = sink
            .stream_messages()
            .iter()
            .filter(|m| matches!(m, StreamMessage::HumanInteractionRequest(_)))
            .count();

        let mut handles = Vec::new();
        for task_id in task_ids {
            let handle = engine.get_task(task_id).unwrap();
            let callback = engine.callback.clone();
            handles.push(tokio::spawn(async move {
                callback.on_human_confirm(&handle, "Browser", "Proceed?").await
            }));
        }

        loop {
            let requests = sink
                .stream_messages()
                .iter()
                .filter(|m| matches!(m, StreamMessage::HumanInteractionRequest(_)))
                .count();
            if requests >= before + task_ids.len() {
                return handles;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_run_returns_engine_result() {
        let (service, _factory, sink) = service_fixture().await;

        let result = service.run("summarize the page").await.unwrap();
        assert!(result.unwrap().success);
        assert!(sink
            .stream_messages()
            .iter()
            .all(|m| !matches!(m, StreamMessage::Error { .. })));
    }

    #[tokio::test]
    async fn test_engine_fault_becomes_terminal_error_event() {
        let (service, factory, sink) = service_fixture().await;
        factory
            .latest()
            .fail_next_run
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let result = service.run("do something").await.unwrap();
        assert!(result.is_none());

        let messages = sink.stream_messages();
        assert!(messages.iter().any(|m| matches!(
            m,
            StreamMessage::Error { error, task_id: None, .. } if error.contains("mock engine failure")
        )));
    }

    #[tokio::test]
    async fn test_modify_unknown_task_reports_error_with_task_id() {
        let (service, _factory, sink) = service_fixture().await;

        let result = service.modify("no-such-task", "change it").await.unwrap();
        assert!(result.is_none());

        let messages = sink.stream_messages();
        assert!(messages.iter().any(|m| matches!(
            m,
            StreamMessage::Error { task_id: Some(id), .. } if id == "no-such-task"
        )));
    }

    #[tokio::test]
    async fn test_task_status_and_cancel() {
        let (service, factory, _sink) = service_fixture().await;
        factory.latest().add_task("task-1");

        assert!(service.task_status("task-1").await.unwrap().running);
        assert!(service.has_running_task().await);

        let abort = service.cancel_task("task-1").await.unwrap();
        assert!(abort.aborted);
        assert_eq!(abort.reason, "user-cancelled");

        assert!(!service.task_status("task-1").await.unwrap().running);
        assert!(!service.has_running_task().await);

        let err = service.task_status("unknown").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_reload_aborts_tasks_rejects_pending_and_swaps_engine() {
        let (service, factory, sink) = service_fixture().await;
        let old_engine = factory.latest();
        old_engine.add_task("task-a");
        old_engine.add_task("task-b");
        let pending = suspend_interactions(&factory, &sink, &["task-a", "task-b"]).await;

        service.reload(test_config()).await.unwrap();

        // All tracked tasks aborted with the reload tag.
        let aborted = old_engine.aborted_tasks();
        assert_eq!(aborted.len(), 2);
        assert!(aborted.iter().all(|(_, reason)| reason == "config-reload"));

        // Every pending human interaction rejected.
        for handle in pending {
            let err = handle.await.unwrap().unwrap_err();
            assert!(err.is_aborted());
        }

        // Fresh instance, nothing running, window notified.
        assert_eq!(factory.created_count(), 2);
        assert!(!service.has_running_task().await);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, HostEvent::ConfigReloaded { .. })));
    }

    #[tokio::test]
    async fn test_human_response_routing() {
        let (service, factory, sink) = service_fixture().await;
        factory.latest().add_task("task-1");
        let mut pending = suspend_interactions(&factory, &sink, &["task-1"]).await;

        let request_id = sink
            .stream_messages()
            .iter()
            .find_map(|m| match m {
                StreamMessage::HumanInteractionRequest(request) => {
                    Some(request.request_id.clone())
                }
                _ => None,
            })
            .unwrap();

        let handled = service
            .handle_human_response(HumanResponse {
                request_id: request_id.clone(),
                success: true,
                result: Some(serde_json::json!(true)),
                error: None,
            })
            .await
            .unwrap();
        assert!(handled);
        assert!(pending.pop().unwrap().await.unwrap().unwrap());

        // A duplicate response is reported as unhandled, not an error.
        let handled = service
            .handle_human_response(HumanResponse {
                request_id,
                success: true,
                result: None,
                error: None,
            })
            .await
            .unwrap();
        assert!(!handled);
    }

    #[tokio::test]
    async fn test_restore_task_reattaches_plan_chain() {
        let (service, factory, _sink) = service_fixture().await;

        let task_id = service
            .restore_task(
                Workflow::new("restored-1"),
                Some(HashMap::from([(
                    "notes".to_string(),
                    serde_json::json!("kept"),
                )])),
                Some(serde_json::json!({"prompt": "original plan"})),
                Some("plan xml".to_string()),
            )
            .await
            .unwrap();

        let handle = factory.latest().get_task(&task_id).unwrap();
        assert!(handle.chain.is_attached());
        assert_eq!(handle.variables.get("notes"), Some(serde_json::json!("kept")));

        // Without chain data the task is still restored, just without
        // conversational memory.
        let bare_id = service
            .restore_task(Workflow::new("restored-2"), None, None, None)
            .await
            .unwrap();
        assert!(!factory.latest().get_task(&bare_id).unwrap().chain.is_attached());
    }

    #[tokio::test]
    async fn test_task_context_snapshot_roundtrip() {
        let (service, factory, _sink) = service_fixture().await;
        let handle = factory.latest().add_task("task-1");
        handle.variables.set("page", serde_json::json!("https://example.com"));
        handle
            .chain
            .attach(serde_json::json!({"prompt": "plan"}), "result".to_string());

        let snapshot = service.task_context("task-1").await.unwrap();
        assert_eq!(snapshot.workflow.task_id, "task-1");
        assert_eq!(
            snapshot.variables.get("page"),
            Some(&serde_json::json!("https://example.com"))
        );
        assert_eq!(snapshot.plan_result.as_deref(), Some("result"));

        let restored = service
            .restore_task(
                snapshot.workflow,
                Some(snapshot.variables),
                snapshot.plan_request,
                snapshot.plan_result,
            )
            .await
            .unwrap();
        assert_eq!(restored, "task-1");
    }

    #[tokio::test]
    async fn test_shutdown_tears_everything_down() {
        let (service, factory, sink) = service_fixture().await;
        let engine = factory.latest();
        engine.add_task("task-1");
        let pending = suspend_interactions(&factory, &sink, &["task-1"]).await;

        service.shutdown("window-closing").await;

        assert_eq!(engine.aborted_tasks().len(), 1);
        // The request settles through either the task-abort path or the bulk
        // reject, depending on which the runtime polls first.
        for handle in pending {
            let err = handle.await.unwrap().unwrap_err();
            assert!(err.is_aborted());
        }

        // The slot is gone: stream-reported calls surface the uninitialized
        // error through the stream channel.
        let result = service.run("anything").await.unwrap();
        assert!(result.is_none());
        assert!(sink.stream_messages().iter().any(|m| matches!(
            m,
            StreamMessage::Error { error, .. } if error.contains("not initialized")
        )));
        assert!(service.cancel_task("task-1").await.unwrap_err().is_uninitialized());
    }
}
