//! The request/response surface the desktop shell calls.
//!
//! One `Host` per process. Every operation is correlated by window id: the
//! registry resolves the owning context first, and an unknown id surfaces as
//! `NotFound` rather than silently touching a wrong context. Push traffic
//! (stream messages, reload notifications, history-panel signals) flows
//! through each window's own sink, never through these calls.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use wingman_core::config::{AgentConfig, ConfigStore, EngineConfig};
use wingman_core::engine::{EngineFactory, Workflow};
use wingman_core::error::Result;
use wingman_core::interaction::HumanResponse;
use wingman_core::ui::{EventSink, TaskWindowFactory, ViewSurface};

use crate::engine_service::{EngineService, TaskContextSnapshot, TaskStatus};
use crate::registry::{WindowContext, WindowContextRegistry};
use crate::task_window::TaskWindowManager;

use wingman_core::engine::{AbortResult, TaskResult};

/// The coordination layer's front door.
pub struct Host {
    registry: WindowContextRegistry,
    config: Arc<dyn ConfigStore>,
    engine_factory: Arc<dyn EngineFactory>,
    task_windows: TaskWindowManager,
}

impl Host {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        engine_factory: Arc<dyn EngineFactory>,
        task_window_factory: Arc<dyn TaskWindowFactory>,
    ) -> Self {
        Self {
            registry: WindowContextRegistry::new(),
            config,
            engine_factory,
            task_windows: TaskWindowManager::new(task_window_factory),
        }
    }

    // ========================================================================
    // Window lifecycle
    // ========================================================================

    /// Registers a newly opened window and builds its engine instance from
    /// current configuration.
    pub async fn open_window(
        &self,
        window_id: &str,
        sink: Arc<dyn EventSink>,
        secondary: Arc<dyn ViewSurface>,
    ) -> Result<Arc<WindowContext>> {
        let config = self.current_engine_config().await?;
        let engine = EngineService::initialize(
            window_id,
            sink.clone(),
            secondary.clone(),
            self.engine_factory.clone(),
            config,
        )
        .await;

        let context = Arc::new(WindowContext::new(window_id, engine, sink, secondary));
        self.registry.register(context.clone()).await;
        info!(%window_id, "window context registered");
        Ok(context)
    }

    /// Unregisters a closing window and runs its teardown cascade: abort all
    /// its tasks, reject its pending human requests, release its views.
    pub async fn close_window(&self, window_id: &str) -> Result<()> {
        let Some(context) = self.registry.remove(window_id).await else {
            return Err(wingman_core::WingmanError::not_found(
                "window context",
                window_id,
            ));
        };
        context.teardown("window-closing").await;
        Ok(())
    }

    // ========================================================================
    // Task operations
    // ========================================================================

    pub async fn run_task(&self, window_id: &str, message: &str) -> Result<Option<TaskResult>> {
        self.registry.get(window_id).await?.engine.run(message).await
    }

    pub async fn modify_task(
        &self,
        window_id: &str,
        task_id: &str,
        message: &str,
    ) -> Result<Option<TaskResult>> {
        self.registry
            .get(window_id)
            .await?
            .engine
            .modify(task_id, message)
            .await
    }

    pub async fn execute_task(&self, window_id: &str, task_id: &str) -> Result<Option<TaskResult>> {
        self.registry
            .get(window_id)
            .await?
            .engine
            .execute(task_id)
            .await
    }

    pub async fn task_status(&self, window_id: &str, task_id: &str) -> Result<TaskStatus> {
        self.registry
            .get(window_id)
            .await?
            .engine
            .task_status(task_id)
            .await
    }

    pub async fn cancel_task(&self, window_id: &str, task_id: &str) -> Result<AbortResult> {
        self.registry
            .get(window_id)
            .await?
            .engine
            .cancel_task(task_id)
            .await
    }

    /// Submits the UI's answer to a pending human interaction. Returns
    /// whether a pending request was actually settled; `false` means the
    /// response was late or duplicated and was ignored.
    pub async fn submit_human_response(
        &self,
        window_id: &str,
        response: HumanResponse,
    ) -> Result<bool> {
        self.registry
            .get(window_id)
            .await?
            .engine
            .handle_human_response(response)
            .await
    }

    /// Fetches a task's conversational state for persistence.
    pub async fn task_context(
        &self,
        window_id: &str,
        task_id: &str,
    ) -> Result<TaskContextSnapshot> {
        self.registry
            .get(window_id)
            .await?
            .engine
            .task_context(task_id)
            .await
    }

    /// Restores a task from a saved snapshot. Returns the restored task id.
    pub async fn restore_task(
        &self,
        window_id: &str,
        workflow: Workflow,
        variables: Option<HashMap<String, Value>>,
        plan_request: Option<Value>,
        plan_result: Option<String>,
    ) -> Result<String> {
        self.registry
            .get(window_id)
            .await?
            .engine
            .restore_task(workflow, variables, plan_request, plan_result)
            .await
    }

    // ========================================================================
    // Agent configuration
    // ========================================================================

    pub async fn agent_config(&self) -> Result<AgentConfig> {
        self.config.agent_config().await
    }

    /// Persists agent configuration and reloads every window's engine.
    pub async fn save_agent_config(&self, config: AgentConfig) -> Result<()> {
        self.config.save_agent_config(&config).await?;
        self.reload_all_contexts().await;
        Ok(())
    }

    /// Re-reads configuration from storage and reloads every window's engine.
    pub async fn reload_agent_config(&self) -> Result<AgentConfig> {
        let agent_config = self.config.agent_config().await?;
        self.reload_all_contexts().await;
        Ok(agent_config)
    }

    /// Rebuilds each window's engine with fresh configuration. A failure in
    /// one window never blocks the others.
    async fn reload_all_contexts(&self) {
        let config = match self.current_engine_config().await {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "cannot read configuration, skipping reload");
                return;
            }
        };

        for context in self.registry.all().await {
            if let Err(e) = context.engine.reload(config.clone()).await {
                error!(window_id = %context.window_id, error = %e, "engine reload failed");
            }
        }
    }

    async fn current_engine_config(&self) -> Result<EngineConfig> {
        Ok(EngineConfig {
            llm: self.config.llm_config().await?,
            agents: self.config.agent_config().await?,
        })
    }

    // ========================================================================
    // History and views
    // ========================================================================

    /// Opens (or activates) the dedicated history window for a task.
    pub async fn open_task_history(&self, task_id: &str) -> Result<()> {
        self.task_windows.open_task_history(task_id).await
    }

    /// Installs a history overlay on the window, replacing any existing one.
    pub async fn show_history_overlay(
        &self,
        window_id: &str,
        overlay: Arc<dyn ViewSurface>,
    ) -> Result<()> {
        self.registry.get(window_id).await?.show_history(overlay).await;
        Ok(())
    }

    pub async fn hide_history_overlay(&self, window_id: &str) -> Result<()> {
        self.registry.get(window_id).await?.hide_history().await;
        Ok(())
    }

    pub async fn set_secondary_visible(&self, window_id: &str, visible: bool) -> Result<()> {
        self.registry.get(window_id).await?.secondary.set_visible(visible)
    }

    pub async fn secondary_url(&self, window_id: &str) -> Result<String> {
        Ok(self.registry.get(window_id).await?.secondary.current_url())
    }

    /// Captures the window's secondary view as a base64 data URL.
    pub async fn capture_secondary(&self, window_id: &str) -> Result<String> {
        self.registry.get(window_id).await?.secondary.capture_page().await
    }
}
