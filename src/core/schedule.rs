//! # When a scheduled task runs.
//!
//! ```text
//! once            ─► cycle
//! every(p) Delay  ─► cycle ─ p ─► cycle ─ p ─► cycle      (p after each cycle ends)
//! every(p) Rate   ─► cycle ──────► cycle ──────► cycle     (cycles start every p)
//! ```
//!
//! With `Rate`, a cycle that overruns its period delays the next one; missed
//! ticks are not replayed in a burst.

use std::time::Duration;

/// How the period of a repeating task is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleType {
    /// Period counts from the end of the previous cycle.
    #[default]
    Delay,
    /// Period counts from the start of the previous cycle.
    Rate,
}

/// Repeat plan for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// `Duration::ZERO` runs the task once.
    pub period: Duration,
    /// How `period` is measured.
    pub kind: ScheduleType,
}

impl Schedule {
    /// Runs a single cycle.
    pub const fn once() -> Self {
        Self {
            period: Duration::ZERO,
            kind: ScheduleType::Delay,
        }
    }

    /// Repeats with `period` between the end of one cycle and the start of the next.
    pub const fn with_delay(period: Duration) -> Self {
        Self {
            period,
            kind: ScheduleType::Delay,
        }
    }

    /// Starts a cycle every `period`.
    pub const fn at_rate(period: Duration) -> Self {
        Self {
            period,
            kind: ScheduleType::Rate,
        }
    }

    /// True for a single-cycle schedule.
    #[inline]
    pub const fn is_once(&self) -> bool {
        self.period.is_zero()
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::once()
    }
}
