//! Human interaction correlation.

pub mod broker;

pub use broker::{HumanInteractionBroker, InteractionPayload};
