//! Configuration model.
//!
//! On-disk persistence is an external collaborator reached through
//! [`ConfigStore`]; this layer only reads the current configuration when
//! building an engine instance and writes agent-level updates back.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Model credentials and endpoint for the engine's LLM calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Per-agent settings the user can edit from the configuration UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            custom_instructions: None,
        }
    }
}

/// Agent-level configuration: which agents are enabled and their custom
/// instructions, keyed by agent name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agents: HashMap<String, AgentSettings>,
}

impl AgentConfig {
    /// Names of agents currently enabled.
    pub fn enabled_agents(&self) -> Vec<String> {
        self.agents
            .iter()
            .filter(|(_, settings)| settings.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Everything an engine instance is constructed with.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub llm: LlmConfig,
    pub agents: AgentConfig,
}

/// External configuration storage.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn llm_config(&self) -> Result<LlmConfig>;

    async fn agent_config(&self) -> Result<AgentConfig>;

    async fn save_agent_config(&self, config: &AgentConfig) -> Result<()>;
}
