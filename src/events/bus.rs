//! # Event bus for lifecycle notifications.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]. Task handles, the registry and
//! bounded executors publish into it; collaborators (status persistence,
//! UI push, [`LogWriter`](crate::LogWriter)) subscribe.
//!
//! ```text
//! TaskHandle ──┐
//! Registry   ──┼──► Bus ──► receiver (persistence: save status on StatusChanged)
//! Executor   ──┘        └─► receiver (LogWriter → tracing)
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; with no receivers the event is dropped.
//! - Capacity is shared by all receivers; a lagging receiver sees `RecvError::Lagged(n)`.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for lifecycle events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus; `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
