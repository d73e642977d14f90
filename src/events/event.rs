//! # Lifecycle events.
//!
//! [`EventKind`] classifies what happened; [`Event`] carries the metadata.
//!
//! ## Ordering guarantees
//! Each event gets a globally unique, monotonically increasing `seq`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskhub::{Event, EventKind, Status};
//!
//! let ev = Event::status_changed("ping-1", Status::Running, Status::Failed)
//!     .with_reason("no ack");
//! assert_eq!(ev.kind, EventKind::StatusChanged);
//! assert_eq!(ev.task.as_deref(), Some("ping-1"));
//! assert_eq!(ev.status, Some(Status::Failed));
//!
//! let hit = Event::new(EventKind::TimeoutHit).with_timeout(Duration::from_secs(5));
//! assert_eq!(hit.timeout_ms, Some(5000));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::status::Status;

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A task changed status.
    ///
    /// Sets `task`, `previous`, `status`, and `reason` when a failure caused it.
    /// Persistence collaborators save the status when they see this.
    StatusChanged,

    /// A task was scheduled in the registry. Sets `task`.
    TaskAdded,

    /// A task left the registry (cancelled or finished). Sets `task`.
    TaskRemoved,

    /// A run cycle is starting. Sets `task`.
    TaskStarting,

    /// A run cycle completed successfully. Sets `task`.
    TaskExecuted,

    /// A run cycle failed. Sets `task`, `reason`.
    TaskFailed,

    /// A bounded call exceeded its deadline. Sets `task` (operation), `timeout_ms`.
    TimeoutHit,

    /// A bounded executor discarded its worker. Sets `task` (operation), `generation` (new).
    WorkerReplaced,

    /// Registry shutdown began.
    ShutdownRequested,

    /// All scheduled tasks stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; remaining tasks were aborted. Sets `reason` (stuck ids).
    GraceExceeded,
}

/// Lifecycle event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Task id (or bounded operation name).
    pub task: Option<Arc<str>>,
    /// Status after the change.
    pub status: Option<Status>,
    /// Status before the change.
    pub previous: Option<Status>,
    /// Human-readable reason (error message, stuck ids).
    pub reason: Option<Arc<str>>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Worker generation.
    pub generation: Option<u64>,
}

impl Event {
    /// Creates an event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            status: None,
            previous: None,
            reason: None,
            timeout_ms: None,
            generation: None,
        }
    }

    /// Shorthand for a [`EventKind::StatusChanged`] event.
    pub fn status_changed(task: impl Into<Arc<str>>, from: Status, to: Status) -> Self {
        let mut ev = Event::new(EventKind::StatusChanged).with_task(task);
        ev.previous = Some(from);
        ev.status = Some(to);
        ev
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout (stored as milliseconds, saturating).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a worker generation.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }
}
