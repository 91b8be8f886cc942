//! Error types for the Wingman coordination layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Wingman coordination layer.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum WingmanError {
    /// The window's engine instance has not been initialized (or was torn down)
    #[error("Engine not initialized")]
    Uninitialized,

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Failure raised from inside an engine run/modify/execute call
    #[error("Engine error: {0}")]
    Engine(String),

    /// A pending human interaction was rejected before a response arrived
    /// (task aborted, configuration reloaded, or context destroyed)
    #[error("Human interaction aborted: {0}")]
    InteractionAborted(String),

    /// The owning window is gone; nothing can be delivered to it
    #[error("Window closed: {0}")]
    WindowClosed(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WingmanError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an Engine error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }

    /// Creates an InteractionAborted error
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::InteractionAborted(reason.into())
    }

    /// Creates a WindowClosed error
    pub fn window_closed(window_id: impl Into<String>) -> Self {
        Self::WindowClosed(window_id.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an Uninitialized error
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Self::Uninitialized)
    }

    /// Check if this is an InteractionAborted error
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::InteractionAborted(_))
    }

    /// Check if this is an Engine error
    pub fn is_engine(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<serde_json::Error> for WingmanError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error (transitional, should be removed eventually)
impl From<anyhow::Error> for WingmanError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Conversion from String (for error messages)
impl From<String> for WingmanError {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}

/// A type alias for `Result<T, WingmanError>`.
pub type Result<T> = std::result::Result<T, WingmanError>;
