//! Broadcast channel for domain events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. The device
//! connection manager, the fetch controller and the API publish
//! [`CompanionEvent`]s; every WebSocket connection subscribes and filters
//! by topic.

use tokio::sync::broadcast;

use super::CompanionEvent;

/// Broadcast bus for [`CompanionEvent`]s.
///
/// Lagging receivers lose the oldest events once the ring buffer is full.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CompanionEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event. Without
    /// receivers the event is dropped.
    pub fn publish(&self, event: CompanionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CompanionEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
