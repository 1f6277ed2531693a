//! Broadcast channel for engine events.

use tokio::sync::broadcast;

use super::Event;

/// Default number of events buffered per subscriber.
const DEFAULT_CAPACITY: usize = 256;

/// Fire-and-forget event broadcast.
///
/// Publishing never blocks and never fails: with no subscribers the event
/// is simply dropped, and a subscriber that falls behind its buffer loses
/// the oldest events (it is expected to resync instead of replaying).
/// Events for a single project are published in the order their
/// triggering state changes occur.
#[derive(Debug, Clone)]
pub struct EventChannel {
    tx: broadcast::Sender<Event>,
}

impl EventChannel {
    /// Create a channel with the default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a channel with an explicit per-subscriber buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: Event) {
        tracing::trace!(project_id = %event.project_id, "publishing event");
        // Err means no subscribers are attached; that is fine.
        let _ = self.tx.send(event);
    }

    /// Subscribe to subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of attached subscribers.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}
