//! # taskhub
//!
//! **Taskhub** is the background-task core of a home-automation hub: the
//! task status state machine, a lifecycle runner around device and script
//! workloads, hard wall-clock bounds for work that may hang, and reply
//! correlation for callback-driven device protocols.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  TaskHandle  │   │  TaskHandle  │   │  TaskHandle  │
//!     │  (ping-1)    │   │  (script-7)  │   │  (listener)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Registry (scheduler)                                             │
//! │  - one TaskActor per scheduled id (once / delay / rate)           │
//! │  - fire_if_need_restart: start, stop or restart per predicates    │
//! │  - graceful shutdown within Config::grace                         │
//! └──────┬────────────────────────────────────────────────────┬───────┘
//!        ▼                                                    │
//!   TaskHandle::run()                                         │
//!     ├─► Task::work(ctx)                                     │
//!     │     ├─► Correlator::await_reply(key, t, send)         │
//!     │     └─► BoundedExecutor::run(t, work) ──► worker thread
//!     └─► status via TransitionTable (StatusChanged)          │
//!                                                             ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!              persistence / UI push / LogWriter (tracing)
//! ```
//!
//! ### Run cycle
//! ```text
//! TaskHandle::run()
//!   ├─► enter Running (if needed)
//!   ├─► work(ctx)
//!   │     ├─ Ok      ─► Executed, error cleared
//!   │     ├─ Severe  ─► Failed, logged, swallowed
//!   │     └─ Err(e)  ─► Failed, logged
//!   │                   └─ on_exception(e) ─► release_resources, re-raise
//!   └─► Registry: a re-raised error stops the schedule
//! ```
//!
//! ## Features
//! | Area              | Description                                                        | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------------|---------------------------------------------|
//! | **Status**        | Closed set of statuses, static transition tables.                  | [`Status`], [`TransitionTable`]             |
//! | **Tasks**         | Capability trait, closure tasks, lifecycle runner, log gating.     | [`Task`], [`TaskFn`], [`TaskHandle`]        |
//! | **Bounded calls** | Deadline per call, worker replaced after a timeout.                | [`BoundedExecutor`], [`ScriptRunner`]       |
//! | **Correlation**   | Await a keyed reply, race-safe against early replies.              | [`Correlator`]                              |
//! | **Scheduling**    | Once / delay / rate schedules, reconcile, graceful shutdown.       | [`Registry`], [`Schedule`]                  |
//! | **Events**        | Lifecycle notifications for persistence and UI.                    | [`Bus`], [`Event`], [`EventKind`]           |
//! | **Errors**        | Typed errors for transitions, task execution and the registry.     | [`StateError`], [`TaskError`], [`RuntimeError`] |
//! | **Configuration** | Timeouts, minimum period, grace, bus capacity, Listening policy.   | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], which mirrors bus events into `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use taskhub::{Config, Correlator, Registry, Schedule, Status, TaskError, TaskFn, TaskHandle};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::new(Config::default());
//!     let replies: Arc<Correlator<String>> = Arc::new(Correlator::new());
//!
//!     let inbound = Arc::clone(&replies);
//!     let ping = TaskFn::new("ping", move |_ctx: CancellationToken| {
//!         let replies = Arc::clone(&inbound);
//!         async move {
//!             let device = Arc::clone(&replies);
//!             replies
//!                 .await_reply("ping-1-msg1", Duration::from_secs(3), move || {
//!                     // the device answers from its own handler
//!                     device.signal("ping-1-msg1", "pong".to_string());
//!                 })
//!                 .await
//!                 .ok_or_else(|| TaskError::fail("no ack"))
//!         }
//!     });
//!     let handle = Arc::new(TaskHandle::new("ping-1", ping).with_bus(registry.bus().clone()));
//!
//!     registry.schedule(handle.clone(), Schedule::once()).await?;
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     assert_eq!(handle.status(), Status::Executed);
//!
//!     registry.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod bounded;
mod config;
mod core;
mod correlation;
mod error;
mod events;
mod status;
mod tasks;

// ---- Public re-exports ----

pub use bounded::{BoundedExecutor, ScriptEngine, ScriptParams, ScriptRunner};
pub use config::Config;
pub use crate::core::{Registry, Schedule, ScheduleType};
pub use correlation::{Armed, Correlator, Waiter, PENDING_GRACE};
pub use error::{RuntimeError, StateError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use status::{assert_transition, can_transition, ListeningPolicy, Status, TransitionTable};
pub use tasks::{
    HandleRef, LogSink, Managed, Task, TaskFn, TaskHandle, TaskInfo, TaskLogger, WriterSink,
};

// Optional: mirror bus events into `tracing`.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use events::LogWriter;
