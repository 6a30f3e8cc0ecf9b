//! Progress fan-out over a tokio broadcast channel.

use tokio::sync::broadcast;

use crate::types::{Event, EventEnvelope};

/// One run publishes a handful of events per state change.
const CAPACITY: usize = 256;

/// Carries progress events from the orchestrator to whoever renders them.
///
/// Clones share the channel. A slow subscriber sees `Lagged` rather than
/// holding the orchestrator back.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CAPACITY);
        Self { sender }
    }

    /// Stamp `event` and send it; returns how many subscribers got it.
    /// Without subscribers the event is dropped.
    pub fn emit(&self, event: Event) -> usize {
        self.sender.send(EventEnvelope::new(event)).unwrap_or(0)
    }

    /// Only events emitted after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
