//! Stream message model.
//!
//! A stream message is a single event in the ordered engine-to-UI channel of
//! one window. Messages are consumed live; there is no persistence here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::interaction::HumanInteractionRequest;

/// Tool name reported while the engine streams file content to disk.
///
/// Streaming argument chunks for this tool are speculatively parsed so the
/// secondary view can preview the file as it is written.
pub const FILE_WRITE_TOOL: &str = "file_write";

/// Tool name the engine reports just before issuing a human interaction
/// request. Its tool id is the secondary correlation id the UI may respond
/// with instead of the broker-generated request id.
pub const HUMAN_INTERACT_TOOL: &str = "human_interact";

/// A single event in the ordered progress/interaction channel from engine to UI.
///
/// Messages for a given task are delivered in emission order. The variants
/// mirror what the UI renders: planning progress, agent text, tool activity,
/// human interaction round-trips, and terminal errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Planning progress: the workflow being built for a task.
    Workflow {
        task_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workflow: Option<Value>,
        #[serde(default)]
        stream_done: bool,
    },
    /// Agent-produced text output.
    Text {
        task_id: String,
        agent_name: String,
        text: String,
        #[serde(default)]
        stream_done: bool,
    },
    /// Agent reasoning output, rendered separately from final text.
    Thinking {
        task_id: String,
        agent_name: String,
        text: String,
        #[serde(default)]
        stream_done: bool,
    },
    /// The engine is about to invoke a tool with fully-formed arguments.
    ToolUse {
        task_id: String,
        agent_name: String,
        tool_id: String,
        tool_name: String,
        params: Value,
    },
    /// Incremental tool-argument streaming; `params_text` is a JSON prefix
    /// that may be truncated mid-string.
    ToolStreaming {
        task_id: String,
        agent_name: String,
        tool_id: String,
        tool_name: String,
        params_text: String,
    },
    /// A tool invocation completed.
    ToolResult {
        task_id: String,
        agent_name: String,
        tool_id: String,
        tool_name: String,
        result: Value,
    },
    /// The engine suspended a task pending a human decision.
    HumanInteractionRequest(HumanInteractionRequest),
    /// A pending human interaction was answered; lets the UI mark the
    /// interaction card as completed.
    HumanInteractionResult { request_id: String, result: Value },
    /// Terminal error event. `task_id` is absent when the task never started.
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
    },
}

impl StreamMessage {
    /// Builds a terminal error event from an error message and optional task id.
    pub fn error(message: impl Into<String>, task_id: Option<String>) -> Self {
        let message = message.into();
        Self::Error {
            detail: Some(message.clone()),
            error: message,
            task_id,
        }
    }
}

/// Outbound push events from the host to a window's UI.
///
/// Everything user-visible flows through the stream variant so the UI has one
/// place to surface it; the remaining variants are host-level notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// An engine stream message for this window.
    Stream { message: StreamMessage },
    /// The window's engine instance was rebuilt with new configuration.
    ConfigReloaded { model: String, provider: String },
    /// A dedicated task window should open its history panel.
    OpenHistoryPanel { task_id: String },
}
