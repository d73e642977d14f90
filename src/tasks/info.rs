//! Point-in-time view of a task handle.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::Schedule;
use crate::status::Status;

/// Snapshot of a task for status displays and persistence.
///
/// `schedule` and `next_run_in` are filled only by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInfo {
    pub id: Arc<str>,
    pub name: String,
    pub description: Option<String>,
    pub status: Status,
    /// Last error message; cleared by a successful cycle.
    pub error: Option<String>,
    /// Free-form diagnostic state set by the task.
    pub state: Option<String>,
    pub created_at: SystemTime,
    /// Number of run cycles started.
    pub run_count: u64,
    pub schedule: Option<Schedule>,
    /// Time until the next cycle of a repeating task.
    pub next_run_in: Option<Duration>,
}
