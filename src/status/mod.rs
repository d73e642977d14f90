//! # Task status state machine.
//!
//! A task is always in exactly one [`Status`]. Which status it may move to next
//! is decided by a static [`TransitionTable`]; nothing else is allowed to
//! change a status.
//!
//! ## Observed adjacency
//! ```text
//! Stopped    ─► Running | Failed | Restarting
//! Running    ─► Stopped | Failed | Restarting
//! NeverRun   ─► Failed  | Running | Stopped | Restarting
//! Failed     ─► Failed  | Running | Executed | Stopped | Restarting
//! Executed   ─► Running | Failed | Restarting
//! Restarting ─► Running | Failed
//! Listening  ─► (none, see ListeningPolicy)
//! ```
//!
//! [`can_transition`] and [`assert_transition`] check against
//! [`TransitionTable::OBSERVED`]. Task handles run with
//! [`TransitionTable::LIFECYCLE`], which adds the two run-cycle edges.

mod table;

pub use table::{ListeningPolicy, TransitionTable};

use std::fmt;

use crate::error::StateError;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    /// Stopped by its owner.
    Stopped,
    /// Started; a run cycle may be in flight.
    Running,
    /// Created, never started.
    NeverRun,
    /// Last cycle or hook failed.
    Failed,
    /// Being restarted by the scheduler.
    Restarting,
    /// Last run cycle completed successfully.
    Executed,
    /// Passive listener (no run loop).
    Listening,
}

impl Status {
    /// Every status, in declaration order.
    pub const ALL: [Status; 7] = [
        Status::Stopped,
        Status::Running,
        Status::NeverRun,
        Status::Failed,
        Status::Restarting,
        Status::Executed,
        Status::Listening,
    ];

    /// Returns true if the observed table allows `self -> to`.
    #[inline]
    pub fn can_transition(self, to: Status) -> bool {
        TransitionTable::OBSERVED.allows(self, to)
    }

    /// Stable snake_case name for logs and persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Stopped => "stopped",
            Status::Running => "running",
            Status::NeverRun => "never_run",
            Status::Failed => "failed",
            Status::Restarting => "restarting",
            Status::Executed => "executed",
            Status::Listening => "listening",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Pure check over [`TransitionTable::OBSERVED`].
#[inline]
pub fn can_transition(from: Status, to: Status) -> bool {
    from.can_transition(to)
}

/// Fails with [`StateError`] unless [`TransitionTable::OBSERVED`] allows `from -> to`.
pub fn assert_transition(from: Status, to: Status) -> Result<(), StateError> {
    TransitionTable::OBSERVED.check(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Status::*;

    const OBSERVED_EDGES: &[(Status, Status)] = &[
        (Stopped, Running),
        (Stopped, Failed),
        (Stopped, Restarting),
        (Running, Stopped),
        (Running, Failed),
        (Running, Restarting),
        (NeverRun, Failed),
        (NeverRun, Running),
        (NeverRun, Stopped),
        (NeverRun, Restarting),
        (Failed, Failed),
        (Failed, Running),
        (Failed, Executed),
        (Failed, Stopped),
        (Failed, Restarting),
        (Executed, Running),
        (Executed, Failed),
        (Executed, Restarting),
        (Restarting, Running),
        (Restarting, Failed),
    ];

    #[test]
    fn every_pair_matches_the_observed_table() {
        for from in Status::ALL {
            for to in Status::ALL {
                let expected = OBSERVED_EDGES.contains(&(from, to));
                assert_eq!(can_transition(from, to), expected, "{from} -> {to}");
                match assert_transition(from, to) {
                    Ok(()) => assert!(expected, "{from} -> {to} should be rejected"),
                    Err(e) => {
                        assert!(!expected, "{from} -> {to} should be accepted");
                        assert_eq!(e, StateError { from, to });
                    }
                }
            }
        }
    }

    #[test]
    fn listening_has_no_outgoing_edges() {
        assert_eq!(TransitionTable::OBSERVED.targets(Listening).count(), 0);
    }

    #[test]
    fn self_transitions_are_explicit() {
        assert!(can_transition(Failed, Failed));
        assert!(!can_transition(Running, Running));
        assert!(!can_transition(Stopped, Stopped));
    }
}
