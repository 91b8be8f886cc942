//! Window context registry.
//!
//! Maps a window identifier to the resources that window exclusively owns:
//! its engine service (and through it the engine instance and broker), its
//! outbound event sink, its secondary view surface, and an on-demand history
//! overlay. Operations from different windows never cross-affect each other;
//! everything is keyed by window id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use wingman_core::error::{Result, WingmanError};
use wingman_core::ui::{EventSink, ViewSurface};

use crate::engine_service::EngineService;

/// The resources owned by one open primary window.
pub struct WindowContext {
    pub window_id: String,
    pub engine: Arc<EngineService>,
    pub sink: Arc<dyn EventSink>,
    pub secondary: Arc<dyn ViewSurface>,
    /// Overlay surface for historical screenshots, created/destroyed on demand.
    history_overlay: Mutex<Option<Arc<dyn ViewSurface>>>,
}

impl WindowContext {
    pub fn new(
        window_id: impl Into<String>,
        engine: Arc<EngineService>,
        sink: Arc<dyn EventSink>,
        secondary: Arc<dyn ViewSurface>,
    ) -> Self {
        Self {
            window_id: window_id.into(),
            engine,
            sink,
            secondary,
            history_overlay: Mutex::new(None),
        }
    }

    /// Installs a history overlay, replacing any existing one.
    pub async fn show_history(&self, overlay: Arc<dyn ViewSurface>) {
        let mut slot = self.history_overlay.lock().await;
        if slot.replace(overlay).is_some() {
            debug!(window_id = %self.window_id, "replaced existing history overlay");
        }
    }

    /// Destroys the history overlay if one exists.
    pub async fn hide_history(&self) {
        if self.history_overlay.lock().await.take().is_some() {
            debug!(window_id = %self.window_id, "history overlay removed");
        }
    }

    pub async fn has_history_overlay(&self) -> bool {
        self.history_overlay.lock().await.is_some()
    }

    /// Full teardown cascade for a closing window: abort all tasks in its
    /// engine, reject all pending human requests, release views.
    pub async fn teardown(&self, reason: &str) {
        info!(window_id = %self.window_id, %reason, "tearing down window context");
        self.engine.shutdown(reason).await;
        self.hide_history().await;
    }
}

/// Registry of all open window contexts.
pub struct WindowContextRegistry {
    /// In-memory context table, keyed by window id
    contexts: Arc<RwLock<HashMap<String, Arc<WindowContext>>>>,
}

impl WindowContextRegistry {
    pub fn new() -> Self {
        Self {
            contexts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, context: Arc<WindowContext>) {
        let mut contexts = self.contexts.write().await;
        contexts.insert(context.window_id.clone(), context);
    }

    /// Looks up the context for a window.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown window id; callers surface this as
    /// "context unavailable" rather than falling back to a wrong context.
    pub async fn get(&self, window_id: &str) -> Result<Arc<WindowContext>> {
        let contexts = self.contexts.read().await;
        contexts
            .get(window_id)
            .cloned()
            .ok_or_else(|| WingmanError::not_found("window context", window_id))
    }

    pub async fn all(&self) -> Vec<Arc<WindowContext>> {
        let contexts = self.contexts.read().await;
        contexts.values().cloned().collect()
    }

    /// Removes a context from the registry. The caller drives the teardown
    /// cascade on the returned context.
    pub async fn remove(&self, window_id: &str) -> Option<Arc<WindowContext>> {
        let mut contexts = self.contexts.write().await;
        contexts.remove(window_id)
    }
}

impl Default for WindowContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}
