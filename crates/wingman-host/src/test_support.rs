//! Mock collaborators shared across the crate's tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use wingman_core::config::{AgentConfig, ConfigStore, EngineConfig, LlmConfig};
use wingman_core::engine::{
    AbortResult, EngineCallback, EngineFactory, TaskEngine, TaskHandle, TaskResult, Workflow,
};
use wingman_core::error::{Result, WingmanError};
use wingman_core::stream::{HostEvent, StreamMessage};
use wingman_core::ui::{EventSink, TaskWindow, TaskWindowFactory, ViewSurface};

// ============================================================================
// Event sink
// ============================================================================

pub struct MockSink {
    events: Mutex<Vec<HostEvent>>,
    closed: AtomicBool,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn stream_messages(&self) -> Vec<StreamMessage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HostEvent::Stream { message } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MockSink {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn emit(&self, event: HostEvent) -> Result<()> {
        if self.is_closed() {
            return Err(WingmanError::window_closed("mock window"));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

// ============================================================================
// Secondary view surface
// ============================================================================

pub struct MockView {
    url: Mutex<String>,
    pub loads: Mutex<Vec<String>>,
    pub file_updates: Mutex<Vec<(String, String)>>,
    pub visible: AtomicBool,
}

impl MockView {
    pub fn new() -> Self {
        Self::at_url("app://home")
    }

    pub fn at_url(url: &str) -> Self {
        Self {
            url: Mutex::new(url.to_string()),
            loads: Mutex::new(Vec::new()),
            file_updates: Mutex::new(Vec::new()),
            visible: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl ViewSurface for MockView {
    fn current_url(&self) -> String {
        self.url.lock().unwrap().clone()
    }

    async fn load_url(&self, url: &str) -> Result<()> {
        *self.url.lock().unwrap() = url.to_string();
        self.loads.lock().unwrap().push(url.to_string());
        Ok(())
    }

    fn send_file_update(&self, kind: &str, content: &str) -> Result<()> {
        self.file_updates
            .lock()
            .unwrap()
            .push((kind.to_string(), content.to_string()));
        Ok(())
    }

    fn set_visible(&self, visible: bool) -> Result<()> {
        self.visible.store(visible, Ordering::SeqCst);
        Ok(())
    }

    async fn capture_page(&self) -> Result<String> {
        Ok("data:image/jpeg;base64,bW9jaw==".to_string())
    }
}

// ============================================================================
// Task engine
// ============================================================================

pub struct MockEngine {
    pub callback: Arc<dyn EngineCallback>,
    tasks: Mutex<HashMap<String, TaskHandle>>,
    pub run_calls: AtomicUsize,
    pub fail_next_run: AtomicBool,
    pub aborted: Mutex<Vec<(String, String)>>,
}

impl MockEngine {
    pub fn new(callback: Arc<dyn EngineCallback>) -> Self {
        Self {
            callback,
            tasks: Mutex::new(HashMap::new()),
            run_calls: AtomicUsize::new(0),
            fail_next_run: AtomicBool::new(false),
            aborted: Mutex::new(Vec::new()),
        }
    }

    /// Registers a running task directly, bypassing `run`.
    pub fn add_task(&self, task_id: &str) -> TaskHandle {
        let handle = TaskHandle::new(Workflow::new(task_id));
        self.tasks
            .lock()
            .unwrap()
            .insert(task_id.to_string(), handle.clone());
        handle
    }

    pub fn aborted_tasks(&self) -> Vec<(String, String)> {
        self.aborted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskEngine for MockEngine {
    async fn run(&self, _message: &str) -> Result<TaskResult> {
        let call = self.run_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_next_run.swap(false, Ordering::SeqCst) {
            return Err(WingmanError::engine("mock engine failure"));
        }
        let handle = self.add_task(&format!("task-{call}"));
        Ok(TaskResult {
            task_id: handle.task_id,
            success: true,
            stop_reason: None,
            result: None,
        })
    }

    async fn modify(&self, task_id: &str, _message: &str) -> Result<()> {
        if !self.tasks.lock().unwrap().contains_key(task_id) {
            return Err(WingmanError::not_found("task", task_id));
        }
        Ok(())
    }

    async fn execute(&self, task_id: &str) -> Result<TaskResult> {
        if !self.tasks.lock().unwrap().contains_key(task_id) {
            return Err(WingmanError::not_found("task", task_id));
        }
        Ok(TaskResult {
            task_id: task_id.to_string(),
            success: true,
            stop_reason: None,
            result: None,
        })
    }

    async fn abort(&self, task_id: &str, reason: &str) -> Result<AbortResult> {
        let tasks = self.tasks.lock().unwrap();
        let Some(handle) = tasks.get(task_id) else {
            return Err(WingmanError::not_found("task", task_id));
        };
        handle.cancellation.cancel();
        self.aborted
            .lock()
            .unwrap()
            .push((task_id.to_string(), reason.to_string()));
        Ok(AbortResult {
            task_id: task_id.to_string(),
            aborted: true,
            reason: reason.to_string(),
        })
    }

    fn get_task(&self, task_id: &str) -> Option<TaskHandle> {
        self.tasks.lock().unwrap().get(task_id).cloned()
    }

    fn all_task_ids(&self) -> Vec<String> {
        self.tasks.lock().unwrap().keys().cloned().collect()
    }

    async fn init_context(
        &self,
        workflow: Workflow,
        variables: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<TaskHandle> {
        let handle = TaskHandle::new(workflow);
        if let Some(variables) = variables {
            for (key, value) in variables {
                handle.variables.set(key, value);
            }
        }
        self.tasks
            .lock()
            .unwrap()
            .insert(handle.task_id.clone(), handle.clone());
        Ok(handle)
    }
}

#[derive(Default)]
pub struct MockEngineFactory {
    pub engines: Mutex<Vec<Arc<MockEngine>>>,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently constructed engine instance.
    pub fn latest(&self) -> Arc<MockEngine> {
        self.engines.lock().unwrap().last().cloned().unwrap()
    }

    pub fn created_count(&self) -> usize {
        self.engines.lock().unwrap().len()
    }
}

impl EngineFactory for MockEngineFactory {
    fn create(
        &self,
        _config: EngineConfig,
        callback: Arc<dyn EngineCallback>,
    ) -> Arc<dyn TaskEngine> {
        let engine = Arc::new(MockEngine::new(callback));
        self.engines.lock().unwrap().push(engine.clone());
        engine
    }
}

// ============================================================================
// Task windows
// ============================================================================

pub struct MockTaskWindow {
    pub sink: Arc<MockSink>,
    pub alive: AtomicBool,
    pub ready: AtomicBool,
    pub activations: AtomicUsize,
}

impl MockTaskWindow {
    pub fn new(ready: bool) -> Self {
        Self {
            sink: Arc::new(MockSink::new()),
            alive: AtomicBool::new(true),
            ready: AtomicBool::new(ready),
            activations: AtomicUsize::new(0),
        }
    }
}

impl TaskWindow for MockTaskWindow {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn activate(&self) -> Result<()> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn sink(&self) -> Arc<dyn EventSink> {
        self.sink.clone()
    }
}

#[derive(Default)]
pub struct MockTaskWindowFactory {
    pub created: Mutex<Vec<Arc<MockTaskWindow>>>,
    pub next_ready: AtomicBool,
}

impl MockTaskWindowFactory {
    pub fn new() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            next_ready: AtomicBool::new(true),
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn latest(&self) -> Arc<MockTaskWindow> {
        self.created.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl TaskWindowFactory for MockTaskWindowFactory {
    async fn create(&self, _task_id: &str, _execution_id: &str) -> Result<Arc<dyn TaskWindow>> {
        let window = Arc::new(MockTaskWindow::new(self.next_ready.load(Ordering::SeqCst)));
        self.created.lock().unwrap().push(window.clone());
        Ok(window)
    }
}

// ============================================================================
// Configuration store
// ============================================================================

pub struct MockConfigStore {
    pub llm: Mutex<LlmConfig>,
    pub agents: Mutex<AgentConfig>,
    pub saves: AtomicUsize,
}

impl MockConfigStore {
    pub fn new() -> Self {
        Self {
            llm: Mutex::new(LlmConfig {
                provider: "anthropic".to_string(),
                model: "claude-test".to_string(),
                api_key: None,
                base_url: None,
            }),
            agents: Mutex::new(AgentConfig::default()),
            saves: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ConfigStore for MockConfigStore {
    async fn llm_config(&self) -> Result<LlmConfig> {
        Ok(self.llm.lock().unwrap().clone())
    }

    async fn agent_config(&self) -> Result<AgentConfig> {
        Ok(self.agents.lock().unwrap().clone())
    }

    async fn save_agent_config(&self, config: &AgentConfig) -> Result<()> {
        *self.agents.lock().unwrap() = config.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
