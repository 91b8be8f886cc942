//! The opaque task engine seam.
//!
//! The agent reasoning engine is an external collaborator. This module
//! defines the narrow interface the coordination layer consumes from it:
//! task lifecycle calls, task handles with a cooperative cancellation token,
//! and the callback object the adapter wires into each engine instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::interaction::HelpKind;
use crate::stream::StreamMessage;

/// A planned workflow for a task, opaque to this layer beyond its task id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(default)]
    pub agents: Vec<Value>,
}

impl Workflow {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            name: None,
            thought: None,
            agents: Vec::new(),
        }
    }
}

/// Prior planning request/result attached to a task for conversational
/// continuity across modify/replan.
///
/// Shared with the engine instance: reattaching chain data after a restore
/// is visible to the engine through the same handle.
#[derive(Clone, Default)]
pub struct PlanChain {
    inner: Arc<Mutex<ChainState>>,
}

#[derive(Default)]
struct ChainState {
    plan_request: Option<Value>,
    plan_result: Option<String>,
}

impl PlanChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reattaches prior plan data, restoring replan continuity.
    pub fn attach(&self, plan_request: Value, plan_result: String) {
        let mut state = self.inner.lock().expect("plan chain lock poisoned");
        state.plan_request = Some(plan_request);
        state.plan_result = Some(plan_result);
    }

    pub fn plan_request(&self) -> Option<Value> {
        self.inner
            .lock()
            .expect("plan chain lock poisoned")
            .plan_request
            .clone()
    }

    pub fn plan_result(&self) -> Option<String> {
        self.inner
            .lock()
            .expect("plan chain lock poisoned")
            .plan_result
            .clone()
    }

    /// True when both prior plan request and result are present.
    pub fn is_attached(&self) -> bool {
        let state = self.inner.lock().expect("plan chain lock poisoned");
        state.plan_request.is_some() && state.plan_result.is_some()
    }
}

/// Named context values of a task: key-unique, order-irrelevant.
#[derive(Clone, Default)]
pub struct TaskVariables {
    inner: Arc<Mutex<HashMap<String, Value>>>,
}

impl TaskVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: HashMap<String, Value>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(map)),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner
            .lock()
            .expect("task variables lock poisoned")
            .insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner
            .lock()
            .expect("task variables lock poisoned")
            .get(key)
            .cloned()
    }

    /// Snapshots the variables as a plain key-value mapping.
    pub fn flatten(&self) -> HashMap<String, Value> {
        self.inner
            .lock()
            .expect("task variables lock poisoned")
            .clone()
    }
}

/// A live handle to a task owned by an engine instance.
///
/// The handle is a snapshot of the workflow plus shared references to the
/// task's chain, variables, and cancellation token. Abort is cooperative:
/// cancelling the token signals the engine, which is responsible for
/// observing it.
#[derive(Clone)]
pub struct TaskHandle {
    pub task_id: String,
    pub workflow: Workflow,
    pub chain: PlanChain,
    pub variables: TaskVariables,
    pub cancellation: CancellationToken,
}

impl TaskHandle {
    pub fn new(workflow: Workflow) -> Self {
        Self {
            task_id: workflow.task_id.clone(),
            workflow,
            chain: PlanChain::new(),
            variables: TaskVariables::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// True iff the task's cancellation signal has not fired.
    pub fn is_running(&self) -> bool {
        !self.cancellation.is_cancelled()
    }
}

/// Result of a completed engine run/execute call. Opaque to this layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Outcome of a cooperative abort request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortResult {
    pub task_id: String,
    pub aborted: bool,
    /// Opaque diagnostic tag, e.g. "user-cancelled" or "config-reload".
    pub reason: String,
}

/// The opaque task engine collaborator, one instance per window context.
#[async_trait]
pub trait TaskEngine: Send + Sync {
    /// Plans and runs a new task from a user message.
    async fn run(&self, message: &str) -> Result<TaskResult>;

    /// Updates an existing task's instructions. Re-execution is a separate
    /// `execute` call.
    async fn modify(&self, task_id: &str, message: &str) -> Result<()>;

    /// Resumes a previously initialized task.
    async fn execute(&self, task_id: &str) -> Result<TaskResult>;

    /// Cooperatively aborts a task. `reason` is an opaque diagnostic tag.
    async fn abort(&self, task_id: &str, reason: &str) -> Result<AbortResult>;

    /// Returns a handle to a tracked task, or `None` if unknown.
    fn get_task(&self, task_id: &str) -> Option<TaskHandle>;

    /// All task ids this instance currently tracks.
    fn all_task_ids(&self) -> Vec<String>;

    /// Re-hydrates a task from a previously captured workflow and variables
    /// without re-running the plan. Returns the handle of the restored task.
    async fn init_context(
        &self,
        workflow: Workflow,
        variables: Option<HashMap<String, Value>>,
    ) -> Result<TaskHandle>;
}

/// The callback object the adapter supplies to each engine instance.
///
/// `on_message` suspends until the message is delivered to the window; the
/// human callbacks suspend until a UI response arrives (or the interaction
/// is rejected by abort/reload/teardown).
#[async_trait]
pub trait EngineCallback: Send + Sync {
    async fn on_message(&self, message: StreamMessage);

    async fn on_human_confirm(
        &self,
        task: &TaskHandle,
        agent_name: &str,
        prompt: &str,
    ) -> Result<bool>;

    async fn on_human_input(
        &self,
        task: &TaskHandle,
        agent_name: &str,
        prompt: &str,
    ) -> Result<String>;

    async fn on_human_select(
        &self,
        task: &TaskHandle,
        agent_name: &str,
        prompt: &str,
        options: &[String],
        multiple: bool,
    ) -> Result<Vec<String>>;

    async fn on_human_help(
        &self,
        task: &TaskHandle,
        agent_name: &str,
        help_kind: HelpKind,
        prompt: &str,
    ) -> Result<String>;
}

/// Constructs engine instances. Reload builds a fresh instance through this
/// seam with updated configuration and a fresh callback wiring.
pub trait EngineFactory: Send + Sync {
    fn create(&self, config: EngineConfig, callback: Arc<dyn EngineCallback>)
    -> Arc<dyn TaskEngine>;
}
