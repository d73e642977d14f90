//! Error types used by the taskhub runtime and tasks.
//!
//! This module defines three error types:
//!
//! - [`StateError`]: an illegal status transition was requested.
//! - [`TaskError`]: errors raised by task work, hooks and bounded calls.
//! - [`RuntimeError`]: errors raised by the task registry itself.
//!
//! All of them provide `as_label` for logs/metrics; the enums also provide `as_message`.

use std::time::Duration;
use thiserror::Error;

use crate::status::Status;

/// # Illegal status transition.
///
/// Raised whenever a transition is requested that the active
/// [`TransitionTable`](crate::TransitionTable) does not contain.
/// This is a programming error and is never clamped or ignored.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("illegal status transition {from} -> {to}")]
pub struct StateError {
    /// Status the handle was in.
    pub from: Status,
    /// Status that was requested.
    pub to: Status,
}

impl StateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        "illegal_transition"
    }
}

/// # Errors produced by task execution.
///
/// `Fail` is the ordinary work error; the task's `on_exception` hook decides
/// whether it is re-raised. `Severe` is the data-integrity class: always
/// logged, never re-raised. `Timeout` comes from bounded calls and always
/// propagates.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    /// A bounded call exceeded its deadline; the worker was replaced.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
        /// Human description of the bounded operation.
        operation: String,
    },

    /// Data-integrity failure (logged, never re-raised).
    #[error("severe error: {error}")]
    Severe {
        /// The underlying error message.
        error: String,
    },

    /// Task work failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task was cancelled by its owner.
    #[error("context cancelled")]
    Canceled,

    /// A status transition was rejected.
    #[error(transparent)]
    State(#[from] StateError),
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`TaskError::Severe`].
    pub fn severe(error: impl Into<String>) -> Self {
        TaskError::Severe {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskhub::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1), operation: "ping".into() };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Severe { .. } => "task_severe",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::State(e) => e.as_label(),
        }
    }

    /// Returns the bare message stored as the task's last error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Timeout { timeout, operation } => {
                format!("{operation} stuck: no result within {timeout:?}")
            }
            TaskError::Severe { error } | TaskError::Fail { error } => error.clone(),
            TaskError::Canceled => "context cancelled".to_string(),
            TaskError::State(e) => e.to_string(),
        }
    }

    /// Indicates the data-integrity class.
    ///
    /// # Example
    /// ```
    /// use taskhub::TaskError;
    ///
    /// assert!(TaskError::severe("duplicate key").is_severe());
    /// assert!(!TaskError::fail("boom").is_severe());
    /// ```
    pub fn is_severe(&self) -> bool {
        matches!(self, TaskError::Severe { .. })
    }

    /// Indicates an exceeded deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout { .. })
    }
}

/// # Errors produced by the task registry.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A task with the same id is already scheduled.
    #[error("task {id:?} is already scheduled")]
    AlreadyExists {
        /// Task id.
        id: String,
    },

    /// No scheduled task has this id.
    #[error("task {id:?} is not scheduled")]
    NotFound {
        /// Task id.
        id: String,
    },

    /// Repeat period is below [`Config::min_period`](crate::Config::min_period).
    #[error("period {period:?} is shorter than the allowed minimum {min:?}")]
    PeriodTooShort {
        /// Requested period.
        period: Duration,
        /// Configured minimum.
        min: Duration,
    },

    /// Shutdown grace period was exceeded; stuck tasks were aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Ids of tasks that did not stop in time.
        stuck: Vec<String>,
    },

    /// The task could not enter `Running` when it was scheduled.
    #[error(transparent)]
    State(#[from] StateError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyExists { .. } => "runtime_already_exists",
            RuntimeError::NotFound { .. } => "runtime_not_found",
            RuntimeError::PeriodTooShort { .. } => "runtime_period_too_short",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::State(e) => e.as_label(),
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::AlreadyExists { id } => format!("already scheduled: {id}"),
            RuntimeError::NotFound { id } => format!("not scheduled: {id}"),
            RuntimeError::PeriodTooShort { period, min } => {
                format!("period {period:?} must be >= {min:?}")
            }
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck tasks={stuck:?}")
            }
            RuntimeError::State(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_mentions_operation() {
        let err = TaskError::Timeout {
            timeout: Duration::from_secs(5),
            operation: "script compile".into(),
        };
        assert!(err.as_message().starts_with("script compile stuck"));
        assert!(err.is_timeout());
    }

    #[test]
    fn state_error_converts_into_task_error() {
        let err: TaskError = StateError {
            from: Status::Listening,
            to: Status::Running,
        }
        .into();
        assert_eq!(err.as_label(), "illegal_transition");
        assert_eq!(err.to_string(), "illegal status transition Listening -> Running");
    }
}
