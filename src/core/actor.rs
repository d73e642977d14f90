//! # TaskActor: drives one scheduled task.
//!
//! Runs cycles of one [`Managed`](crate::Managed) handle per its [`Schedule`].
//!
//! ## Architecture
//! ```text
//! Registry::schedule ──► TaskActor::run()
//!
//! loop {
//!   ├─► handle.run_cycle()  (panics caught)
//!   │       ├─ Ok      ─► once? exit Finished
//!   │       └─ Err/panic ─► exit Failed(msg)
//!   ├─► next = Delay: now + period
//!   │          Rate:  max(cycle_start + period, now)
//!   └─► sleep_until(next)   (cancellable)
//! }
//! ```
//!
//! ## Rules
//! - Cycles of one actor never overlap.
//! - Cancellation drops an in-flight cycle at its next await point.
//! - A swallowed failure (`on_exception == false`) keeps the schedule going.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::select;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::bounded::panic_message;
use crate::core::schedule::{Schedule, ScheduleType};
use crate::tasks::HandleRef;

/// Why an actor loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ActorExit {
    /// A single-cycle schedule completed.
    Finished,
    /// The registry cancelled the actor.
    Cancelled,
    /// A cycle re-raised an error or panicked.
    Failed(String),
}

/// Instant of the next planned cycle, shared with the registry for displays.
#[derive(Debug, Default)]
pub(crate) struct NextRun(Mutex<Option<Instant>>);

impl NextRun {
    fn set(&self, at: Option<Instant>) {
        *self.0.lock().unwrap_or_else(|p| p.into_inner()) = at;
    }

    /// Time left until the next cycle; `None` while a cycle runs or for one-shot tasks.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        let at = (*self.0.lock().unwrap_or_else(|p| p.into_inner()))?;
        Some(at.saturating_duration_since(Instant::now()))
    }
}

pub(crate) struct TaskActor {
    handle: HandleRef,
    schedule: Schedule,
    next: Arc<NextRun>,
}

impl TaskActor {
    pub(crate) fn new(handle: HandleRef, schedule: Schedule, next: Arc<NextRun>) -> Self {
        Self {
            handle,
            schedule,
            next,
        }
    }

    /// Runs cycles until the schedule completes, a cycle fails, or `token` is cancelled.
    pub(crate) async fn run(self, token: CancellationToken) -> ActorExit {
        loop {
            if token.is_cancelled() {
                return ActorExit::Cancelled;
            }
            self.next.set(None);
            let started = Instant::now();

            let cycle = AssertUnwindSafe(self.handle.run_cycle()).catch_unwind();
            let res = select! {
                res = cycle => res,
                _ = token.cancelled() => return ActorExit::Cancelled,
            };
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return ActorExit::Failed(e.as_message()),
                Err(payload) => {
                    return ActorExit::Failed(format!(
                        "cycle panicked: {}",
                        panic_message(payload.as_ref())
                    ))
                }
            }

            if self.schedule.is_once() {
                return ActorExit::Finished;
            }
            let now = Instant::now();
            let at = match self.schedule.kind {
                ScheduleType::Delay => now + self.schedule.period,
                ScheduleType::Rate => (started + self.schedule.period).max(now),
            };
            self.next.set(Some(at));

            select! {
                _ = time::sleep_until(at) => {}
                _ = token.cancelled() => return ActorExit::Cancelled,
            }
        }
    }
}
