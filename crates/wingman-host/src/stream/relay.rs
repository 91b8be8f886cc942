//! The stream message relay.
//!
//! One relay per engine instance: it is the callback object handed to the
//! engine, and it is the only path from engine-emitted messages to the
//! window's UI. Every message is forwarded in emission order through the
//! window's event sink; two message shapes additionally trigger side effects
//! (tool correlation capture, file-write preview). Side effects run with
//! independent failure handling and never block or reorder delivery.

use std::sync::Arc;

use async_trait::async_trait;

use wingman_core::engine::{EngineCallback, TaskHandle};
use wingman_core::error::Result;
use wingman_core::interaction::HelpKind;
use wingman_core::stream::{FILE_WRITE_TOOL, HUMAN_INTERACT_TOOL, HostEvent, StreamMessage};
use wingman_core::ui::{EventSink, ViewSurface};
use tracing::{debug, warn};

use crate::interaction::{HumanInteractionBroker, InteractionPayload};
use crate::stream::repair;

/// Page the secondary view is redirected to for file previews.
pub const FILE_VIEW_URL: &str = "app://file-view";
const FILE_VIEW_PAGE: &str = "file-view";

/// Routes engine stream callbacks to one window's UI and broker.
pub struct StreamRelay {
    sink: Arc<dyn EventSink>,
    secondary: Arc<dyn ViewSurface>,
    broker: Arc<HumanInteractionBroker>,
}

impl StreamRelay {
    pub fn new(
        sink: Arc<dyn EventSink>,
        secondary: Arc<dyn ViewSurface>,
        broker: Arc<HumanInteractionBroker>,
    ) -> Self {
        Self {
            sink,
            secondary,
            broker,
        }
    }

    /// Redirects the secondary view to the file preview page and pushes the
    /// content recovered from a streamed `file_write` argument chunk.
    ///
    /// Best effort: an unrecoverable chunk or a failed navigation is logged
    /// and otherwise ignored.
    async fn preview_file_write(&self, params_text: &str) {
        let Some(args) = repair::parse_partial_json(params_text) else {
            debug!("file stream chunk not recoverable yet");
            return;
        };
        let Some(content) = args.get("content").and_then(|v| v.as_str()) else {
            return;
        };

        if !self.secondary.current_url().contains(FILE_VIEW_PAGE) {
            // Navigation resolves at load-complete, so the content below
            // lands on a page that can receive it.
            if let Err(e) = self.secondary.load_url(FILE_VIEW_URL).await {
                warn!(error = %e, "failed to open file view");
                return;
            }
        }
        if let Err(e) = self.secondary.send_file_update("code", content) {
            warn!(error = %e, "failed to push file content to view");
        }
    }
}

#[async_trait]
impl EngineCallback for StreamRelay {
    async fn on_message(&self, message: StreamMessage) {
        if self.sink.is_closed() {
            warn!("window destroyed, dropping stream message");
            return;
        }

        // The tool id must be captured before the message reaches the UI, so
        // the response path can already correlate by it.
        if let StreamMessage::ToolUse {
            tool_name, tool_id, ..
        } = &message
        {
            if tool_name == HUMAN_INTERACT_TOOL {
                self.broker.capture_tool_correlation(tool_id);
            }
        }

        let file_write_params = match &message {
            StreamMessage::ToolStreaming {
                tool_name,
                params_text,
                ..
            } if tool_name == FILE_WRITE_TOOL => Some(params_text.clone()),
            _ => None,
        };

        if let Err(e) = self.sink.emit(HostEvent::Stream { message }) {
            warn!(error = %e, "failed to deliver stream message");
        }

        if let Some(params_text) = file_write_params {
            self.preview_file_write(&params_text).await;
        }
    }

    async fn on_human_confirm(
        &self,
        task: &TaskHandle,
        agent_name: &str,
        prompt: &str,
    ) -> Result<bool> {
        let value = self
            .broker
            .request(
                &task.task_id,
                &task.cancellation,
                InteractionPayload::confirm(agent_name, prompt),
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn on_human_input(
        &self,
        task: &TaskHandle,
        agent_name: &str,
        prompt: &str,
    ) -> Result<String> {
        let value = self
            .broker
            .request(
                &task.task_id,
                &task.cancellation,
                InteractionPayload::input(agent_name, prompt),
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn on_human_select(
        &self,
        task: &TaskHandle,
        agent_name: &str,
        prompt: &str,
        options: &[String],
        multiple: bool,
    ) -> Result<Vec<String>> {
        let value = self
            .broker
            .request(
                &task.task_id,
                &task.cancellation,
                InteractionPayload::select(agent_name, prompt, options.to_vec(), multiple),
            )
            .await?;

        let selected = match value {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|item| item.as_str().map(ToString::to_string))
                .collect(),
            serde_json::Value::String(single) => vec![single],
            _ => Vec::new(),
        };
        Ok(selected)
    }

    async fn on_human_help(
        &self,
        task: &TaskHandle,
        agent_name: &str,
        help_kind: HelpKind,
        prompt: &str,
    ) -> Result<String> {
        // Best-effort page context; the view may be anywhere.
        let page_url = Some(self.secondary.current_url()).filter(|url| !url.is_empty());
        let value = self
            .broker
            .request(
                &task.task_id,
                &task.cancellation,
                InteractionPayload::request_help(agent_name, prompt, help_kind, page_url),
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}
