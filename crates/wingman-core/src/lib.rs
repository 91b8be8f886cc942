//! Core domain types and collaborator seams for the Wingman coordination
//! layer.
//!
//! This crate defines what the host coordinates over: the stream message
//! model, the human interaction model, the opaque task engine interface, the
//! configuration model, and the UI surface traits implemented by the desktop
//! shell. The coordination logic itself lives in `wingman-host`.

pub mod config;
pub mod engine;
pub mod error;
pub mod interaction;
pub mod stream;
pub mod ui;

// Re-export common error type
pub use error::{Result, WingmanError};
