use super::types::{CoreEvent, EventSequence, UiEvent};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

pub type EventReceiver = broadcast::Receiver<CoreEvent>;
pub type EventSender = broadcast::Sender<CoreEvent>;

/// Broadcast bus for core-to-presentation events.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: EventSender,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Publish an event (returns sequence number). Publishing with no
    /// subscribers is not an error; the event is simply dropped.
    pub fn publish(&self, payload: UiEvent) -> EventSequence {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        let event = CoreEvent {
            sequence,
            timestamp: Utc::now(),
            payload,
        };

        if self.sender.send(event).is_err() {
            debug!(sequence, "event published with no subscribers");
        }
        sequence
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Get current sequence number
    pub fn current_sequence(&self) -> EventSequence {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Get number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
