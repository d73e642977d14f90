//! # LogWriter: bus to `tracing` bridge
//!
//! Drains a [`Bus`] receiver and emits one `tracing` record per event.
//!
//! ## Example output
//! ```text
//! INFO  taskhub: status task="ping-1" from=NeverRun to=Running
//! WARN  taskhub: timeout operation="script compile" timeout_ms=5000
//! ERROR taskhub: failed task="ping-1" reason="no ack within 3s"
//! ```

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};

/// Event writer.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Spawns a task that logs every event published on `bus` until the bus is dropped.
    pub fn spawn(self, bus: &Bus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => self.write(&ev),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "log writer lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn write(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::StatusChanged => match e.status {
                Some(crate::Status::Failed) => tracing::warn!(
                    task, from = ?e.previous, to = ?e.status, reason, "status"
                ),
                _ => tracing::info!(task, from = ?e.previous, to = ?e.status, "status"),
            },
            EventKind::TaskAdded => tracing::info!(task, "added"),
            EventKind::TaskRemoved => tracing::info!(task, "removed"),
            EventKind::TaskStarting => tracing::debug!(task, "starting"),
            EventKind::TaskExecuted => tracing::debug!(task, "executed"),
            EventKind::TaskFailed => tracing::error!(task, reason, "failed"),
            EventKind::TimeoutHit => {
                tracing::warn!(operation = task, timeout_ms = ?e.timeout_ms, "timeout")
            }
            EventKind::WorkerReplaced => {
                tracing::warn!(operation = task, generation = ?e.generation, "worker replaced")
            }
            EventKind::ShutdownRequested => tracing::info!("shutdown requested"),
            EventKind::AllStoppedWithin => tracing::info!("all tasks stopped within grace"),
            EventKind::GraceExceeded => tracing::error!(stuck = reason, "grace exceeded"),
        }
    }
}
