//! Progress events for deployment runs
//!
//! The orchestrator publishes typed events here; presentation layers
//! subscribe and decide how to render them.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
