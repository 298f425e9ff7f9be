//! Aggregate counters for a batch run.

use serde::Serialize;
use std::time::Duration;

use crate::acquire::FetchOutcome;
use crate::artifact::ArtifactId;

/// Counts of outcomes plus the failures behind them.
///
/// `errors` is kept sorted by `(id, reason)`, which makes [`Self::merge`]
/// commutative and associative: partial results folded in any order produce
/// identical totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Items fetched and committed.
    pub success: usize,
    /// Items already present.
    pub skipped: usize,
    /// Items that failed.
    pub failed: usize,
    /// Failure reasons by ID.
    pub errors: Vec<(ArtifactId, String)>,
}

impl BatchStats {
    /// Folds one outcome into the counters.
    pub fn record(&mut self, id: ArtifactId, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Success { .. } => self.success += 1,
            FetchOutcome::Skipped { .. } => self.skipped += 1,
            FetchOutcome::Failed(failure) => {
                self.failed += 1;
                let entry = (id, failure.reason.clone());
                let at = self.errors.partition_point(|existing| *existing <= entry);
                self.errors.insert(at, entry);
            }
        }
    }

    /// Combines two partial results.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.success += other.success;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.errors.extend(other.errors);
        self.errors.sort();
        self
    }

    /// Number of outcomes recorded.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.success + self.skipped + self.failed
    }
}

/// Result of a completed batch, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// Aggregate counters.
    pub stats: BatchStats,
    /// Wall-clock time from first dispatch to last completion.
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Items per second, absent when the run was too short to measure.
    pub rate: Option<f64>,
}

impl BatchReport {
    /// Builds a report, deriving the throughput from `elapsed`.
    #[must_use]
    pub fn new(stats: BatchStats, elapsed: Duration) -> Self {
        let rate = throughput(stats.total(), elapsed);
        Self {
            stats,
            elapsed,
            rate,
        }
    }

    /// One line per failure, formatted as `ID: reason`.
    #[must_use]
    pub fn error_lines(&self) -> Vec<String> {
        self.stats
            .errors
            .iter()
            .map(|(id, reason)| format!("{id}: {reason}"))
            .collect()
    }
}

/// Items per second, or `None` when `elapsed` is below one millisecond.
#[expect(
    clippy::cast_precision_loss,
    clippy::float_arithmetic,
    reason = "throughput is a display figure; item counts stay far below 2^52"
)]
fn throughput(items: usize, elapsed: Duration) -> Option<f64> {
    if elapsed.as_millis() == 0 {
        return None;
    }
    Some(items as f64 / elapsed.as_secs_f64())
}

fn serialize_secs<S>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(elapsed.as_secs_f64())
}
