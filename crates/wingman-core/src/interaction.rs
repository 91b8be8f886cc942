//! Human interaction model.
//!
//! A human interaction is a point where the engine suspends a task pending a
//! UI-supplied decision. The request travels to the UI as a stream message;
//! the response comes back through the window's request/response surface and
//! is correlated by either the broker-generated request id or the tool-scoped
//! secondary id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of decision the engine is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractKind {
    Confirm,
    Input,
    Select,
    RequestHelp,
}

/// What kind of help the engine needs from the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpKind {
    /// The agent is blocked on a login the human has to perform.
    Login,
    /// Generic assistance request.
    Request,
}

/// The request payload sent to the UI for a pending human interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanInteractionRequest {
    /// Broker-generated id, unique per engine instance lifetime.
    pub request_id: String,
    pub task_id: String,
    pub agent_name: String,
    pub interact_kind: InteractKind,
    pub prompt: String,
    /// Options to choose from (`Select` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Whether multiple options may be selected (`Select` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple: Option<bool>,
    /// What kind of help is needed (`RequestHelp` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_kind: Option<HelpKind>,
    /// Best-effort page context at the time help was requested
    /// (`RequestHelp` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
}

impl HumanInteractionRequest {
    /// Builds a bare request with no kind-specific fields.
    pub fn new(
        request_id: impl Into<String>,
        task_id: impl Into<String>,
        agent_name: impl Into<String>,
        interact_kind: InteractKind,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            task_id: task_id.into(),
            agent_name: agent_name.into(),
            interact_kind,
            prompt: prompt.into(),
            options: None,
            multiple: None,
            help_kind: None,
            page_url: None,
        }
    }
}

/// The UI's answer to a pending human interaction.
///
/// `request_id` may be either the broker-generated request id or the
/// secondary tool-scoped id; the broker resolves by whichever it is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanResponse {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
