//! # Static transition tables.
//!
//! A [`TransitionTable`] stores, for every [`Status`], the set of statuses it
//! may move to, packed as one bitmask per row. Tables are `Copy` values built
//! at compile time; they are never mutated once a handle holds one.

use crate::error::StateError;
use crate::status::Status;

const fn bit(s: Status) -> u8 {
    1 << (s as u8)
}

const fn row(targets: &[Status]) -> u8 {
    let mut mask = 0;
    let mut i = 0;
    while i < targets.len() {
        mask |= bit(targets[i]);
        i += 1;
    }
    mask
}

/// How the `Listening` row is filled.
///
/// The observed behavior never moves a listener anywhere; `LikeRunning`
/// lets a listener be stopped, failed or restarted like a running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListeningPolicy {
    /// No outgoing transitions.
    #[default]
    Terminal,
    /// Same targets as `Running`.
    LikeRunning,
}

/// Adjacency table: `rows[from]` is the bitmask of allowed targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionTable {
    rows: [u8; 7],
}

impl TransitionTable {
    /// Transitions a background process is allowed to take, exactly.
    pub const OBSERVED: TransitionTable = TransitionTable {
        rows: [
            // Stopped
            row(&[Status::Running, Status::Failed, Status::Restarting]),
            // Running
            row(&[Status::Stopped, Status::Failed, Status::Restarting]),
            // NeverRun
            row(&[
                Status::Failed,
                Status::Running,
                Status::Stopped,
                Status::Restarting,
            ]),
            // Failed
            row(&[
                Status::Failed,
                Status::Running,
                Status::Executed,
                Status::Stopped,
                Status::Restarting,
            ]),
            // Restarting
            row(&[Status::Running, Status::Failed]),
            // Executed
            row(&[Status::Running, Status::Failed, Status::Restarting]),
            // Listening
            0,
        ],
    };

    /// [`Self::OBSERVED`] plus the run-cycle edges: a successful cycle
    /// (`Running -> Executed`) and cancelling after it (`Executed -> Stopped`).
    pub const LIFECYCLE: TransitionTable = TransitionTable::OBSERVED
        .with_edge(Status::Running, Status::Executed)
        .with_edge(Status::Executed, Status::Stopped);

    /// Returns a copy with `from -> to` added.
    #[must_use]
    pub const fn with_edge(mut self, from: Status, to: Status) -> Self {
        self.rows[from as usize] |= bit(to);
        self
    }

    /// Returns a copy with the `Listening` row filled per `policy`.
    #[must_use]
    pub const fn with_listening(mut self, policy: ListeningPolicy) -> Self {
        self.rows[Status::Listening as usize] = match policy {
            ListeningPolicy::Terminal => 0,
            ListeningPolicy::LikeRunning => self.rows[Status::Running as usize],
        };
        self
    }

    /// Returns true if `from -> to` is in the table.
    #[inline]
    pub const fn allows(&self, from: Status, to: Status) -> bool {
        self.rows[from as usize] & bit(to) != 0
    }

    /// Iterates the allowed targets of `from`.
    pub fn targets(&self, from: Status) -> impl Iterator<Item = Status> + '_ {
        Status::ALL
            .into_iter()
            .filter(move |to| self.allows(from, *to))
    }

    /// Fails with [`StateError`] if `from -> to` is not in the table.
    pub fn check(&self, from: Status, to: Status) -> Result<(), StateError> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(StateError { from, to })
        }
    }
}

impl Default for TransitionTable {
    /// Returns [`TransitionTable::LIFECYCLE`].
    fn default() -> Self {
        TransitionTable::LIFECYCLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_adds_only_run_cycle_edges() {
        let observed = TransitionTable::OBSERVED;
        let lifecycle = TransitionTable::LIFECYCLE;
        let mut added = Vec::new();
        for from in Status::ALL {
            for to in Status::ALL {
                if observed.allows(from, to) {
                    assert!(lifecycle.allows(from, to));
                } else if lifecycle.allows(from, to) {
                    added.push((from, to));
                }
            }
        }
        assert_eq!(
            added,
            vec![
                (Status::Running, Status::Executed),
                (Status::Executed, Status::Stopped)
            ]
        );
    }

    #[test]
    fn listening_policy_like_running_copies_the_row() {
        let t = TransitionTable::OBSERVED.with_listening(ListeningPolicy::LikeRunning);
        let running: Vec<_> = t.targets(Status::Running).collect();
        let listening: Vec<_> = t.targets(Status::Listening).collect();
        assert_eq!(running, listening);

        let back = t.with_listening(ListeningPolicy::Terminal);
        assert_eq!(back, TransitionTable::OBSERVED);
    }
}
