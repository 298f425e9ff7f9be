//! Decile progress reporting.

use tracing::info;

use super::stats::BatchStats;
use crate::observability::BATCH_TARGET;

/// Emits an INFO event each time another tenth of the batch completes.
#[derive(Debug)]
pub(super) struct Progress {
    total: usize,
    last_decile: usize,
}

impl Progress {
    pub(super) const fn new(total: usize) -> Self {
        Self {
            total,
            last_decile: 0,
        }
    }

    /// Reports `stats` if they cross a new decile, returning that decile.
    pub(super) fn advance(&mut self, stats: &BatchStats) -> Option<usize> {
        let done = stats.total();
        let decile = done.saturating_mul(10).checked_div(self.total)?;
        if decile <= self.last_decile {
            return None;
        }
        self.last_decile = decile;
        info!(
            target: BATCH_TARGET,
            done,
            total = self.total,
            ok = stats.success,
            skip = stats.skipped,
            fail = stats.failed,
            percent = decile.saturating_mul(10),
            "progress"
        );
        Some(decile)
    }
}
