//! Dedicated task-history windows.
//!
//! A task's history is viewed in its own window, independent of the primary
//! window. The manager is idempotent per task id: while a window is alive, a
//! second open request activates it instead of creating a duplicate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use wingman_core::error::Result;
use wingman_core::stream::HostEvent;
use wingman_core::ui::{TaskWindow, TaskWindowFactory};

/// How often and how long to poll a fresh window for readiness before the
/// history-panel signal is sent anyway (best effort).
const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);
const READY_POLL_ATTEMPTS: u32 = 10;

/// Tracks the dedicated history window of each task.
pub struct TaskWindowManager {
    windows: RwLock<HashMap<String, Arc<dyn TaskWindow>>>,
    factory: Arc<dyn TaskWindowFactory>,
}

impl TaskWindowManager {
    pub fn new(factory: Arc<dyn TaskWindowFactory>) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            factory,
        }
    }

    /// Returns the live window for a task, activating it, or creates one.
    ///
    /// Dead windows are evicted on lookup, so a task whose window was closed
    /// gets a fresh one on the next request.
    pub async fn get_or_create(&self, task_id: &str) -> Result<Arc<dyn TaskWindow>> {
        let mut windows = self.windows.write().await;

        if let Some(window) = windows.get(task_id) {
            if window.is_alive() {
                debug!(%task_id, "task window exists, activating");
                window.activate()?;
                return Ok(window.clone());
            }
            windows.remove(task_id);
        }

        // Execution id distinguishes history viewing from task execution.
        let execution_id = format!("view_history_{}", chrono::Utc::now().timestamp_millis());
        info!(%task_id, %execution_id, "creating task history window");
        let window = self.factory.create(task_id, &execution_id).await?;
        windows.insert(task_id.to_string(), window.clone());
        Ok(window)
    }

    /// Opens (or activates) the task's history window and signals it to show
    /// the history panel for the task.
    ///
    /// The signal may race the window's content load, so readiness is polled
    /// with a bound before the event is emitted.
    pub async fn open_task_history(&self, task_id: &str) -> Result<()> {
        let window = self.get_or_create(task_id).await?;

        let mut attempts = 0;
        while !window.is_ready() && attempts < READY_POLL_ATTEMPTS {
            attempts += 1;
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        if !window.is_ready() {
            warn!(%task_id, "task window never signalled ready, sending history panel event anyway");
        }

        window.sink().emit(HostEvent::OpenHistoryPanel {
            task_id: task_id.to_string(),
        })?;
        Ok(())
    }
}
