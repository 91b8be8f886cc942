//! UI-side trait seams.
//!
//! Window rendering and lifecycle belong to the desktop shell; the
//! coordination layer only needs an outbound event channel per window, a
//! handle to the window's secondary display surface, and a way to construct
//! dedicated task-history windows. The shell implements these traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::stream::HostEvent;

/// The single outbound push channel to one window's UI.
///
/// Events emitted through one sink are delivered in emission order.
pub trait EventSink: Send + Sync {
    /// True once the window is destroyed; nothing can be delivered anymore.
    fn is_closed(&self) -> bool;

    fn emit(&self, event: HostEvent) -> Result<()>;
}

/// A window's secondary display surface (the detail/browser view the engine
/// drives), which the coordination layer may redirect to other pages.
#[async_trait]
pub trait ViewSurface: Send + Sync {
    fn current_url(&self) -> String;

    /// Navigates the surface and resolves once the page finished loading.
    async fn load_url(&self, url: &str) -> Result<()>;

    /// Pushes recovered file content to the surface's file-view page.
    fn send_file_update(&self, kind: &str, content: &str) -> Result<()>;

    fn set_visible(&self, visible: bool) -> Result<()>;

    /// Captures the surface as a base64 data URL.
    async fn capture_page(&self) -> Result<String>;
}

/// A dedicated window for viewing one task's history, independent of the
/// primary window.
pub trait TaskWindow: Send + Sync {
    fn is_alive(&self) -> bool;

    /// True once the window content finished loading and can receive events.
    fn is_ready(&self) -> bool;

    /// Shows and focuses the window.
    fn activate(&self) -> Result<()>;

    fn sink(&self) -> Arc<dyn EventSink>;
}

/// Constructs dedicated task-history windows on demand.
#[async_trait]
pub trait TaskWindowFactory: Send + Sync {
    async fn create(&self, task_id: &str, execution_id: &str) -> Result<Arc<dyn TaskWindow>>;
}
