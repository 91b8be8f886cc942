//! Host-side coordination for agent task windows.
//!
//! This crate wires the domain seams of `wingman-core` into a running host:
//! a registry of per-window contexts, an engine service that owns one engine
//! instance per window and swaps it atomically on configuration reload, a
//! broker that correlates human-interaction requests with their responses,
//! a stream relay that multiplexes engine output into UI events and view
//! side effects, and a manager for dedicated task-history windows. The
//! [`api::Host`] facade is the single entry point the desktop shell calls.

pub mod api;
pub mod engine_service;
pub mod interaction;
pub mod registry;
pub mod stream;
pub mod task_window;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::Host;
pub use engine_service::{EngineService, TaskContextSnapshot, TaskStatus};
pub use interaction::{HumanInteractionBroker, InteractionPayload};
pub use registry::{WindowContext, WindowContextRegistry};
pub use stream::StreamRelay;
pub use task_window::TaskWindowManager;
