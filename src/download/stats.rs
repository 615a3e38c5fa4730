//! Run totals.
//!
//! Download tasks never touch shared counters. Each task returns its
//! [`TaskOutcome`] and the engine folds outcomes into a [`RunTotals`] as tasks
//! join, so the totals have exactly one owner and need no synchronisation.

use std::fmt;

use serde::Serialize;

use super::task::TaskOutcome;

/// Aggregate result of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    /// Items downloaded successfully.
    pub ok: u64,
    /// Items that ended in failure.
    pub failed: u64,
    /// Items left alone because the destination existed.
    pub skipped: u64,
    /// Bytes written by successful items.
    pub total_bytes: u64,
}

impl RunTotals {
    /// Creates zeroed totals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one terminal outcome into the totals.
    pub fn record(&mut self, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Success { bytes, .. } => {
                self.ok += 1;
                self.total_bytes = self.total_bytes.saturating_add(*bytes);
            }
            TaskOutcome::Skipped { .. } => self.skipped += 1,
            TaskOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Counts a failure that produced no outcome (a crashed unit, an unreadable page).
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Returns the number of items with a terminal result.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.ok + self.failed + self.skipped
    }
}

impl fmt::Display for RunTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "successful: {} skipped: {} failed: {} total: {}B",
            self.ok, self.skipped, self.failed, self.total_bytes
        )
    }
}
