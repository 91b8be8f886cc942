//! Stream message multiplexing.

pub mod relay;
pub mod repair;

pub use relay::StreamRelay;
