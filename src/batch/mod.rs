//! Fans a list of IDs out over a bounded worker pool.
//!
//! Workers pull IDs from a shared queue and report each outcome over a
//! channel. The calling thread is the only consumer, so counters are folded
//! without further locking and are complete once every worker has finished.

mod progress;
mod stats;

pub use stats::{BatchReport, BatchStats};

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::Context;
use std::num::NonZeroUsize;
use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

use self::progress::Progress;
use crate::acquire::{Acquirer, FetchOutcome};
use crate::artifact::ArtifactId;
use crate::error::BatchResult;
use crate::fs::ensure_dir_exists;
use crate::observability::BATCH_TARGET;

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(workers) => workers,
    None => NonZeroUsize::MIN,
};

/// Settings for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Directory receiving committed files. Created when missing.
    pub dest_dir: Utf8PathBuf,
    /// Upper bound on concurrent acquisitions.
    pub workers: NonZeroUsize,
    /// Report existing files as skipped instead of fetching them again.
    pub skip_existing: bool,
}

impl BatchOptions {
    /// Options with default concurrency that skip existing files.
    #[must_use]
    pub fn new(dest_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            workers: DEFAULT_WORKERS,
            skip_existing: true,
        }
    }

    /// Overrides the worker count.
    #[must_use]
    pub const fn with_workers(mut self, workers: NonZeroUsize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets whether existing files are skipped.
    #[must_use]
    pub const fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }
}

/// Runs many acquisitions concurrently and aggregates their outcomes.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    acquirer: Acquirer,
}

impl BatchOrchestrator {
    /// Creates an orchestrator driving `acquirer`.
    #[must_use]
    pub const fn new(acquirer: Acquirer) -> Self {
        Self { acquirer }
    }

    /// Acquires every ID in `ids`.
    ///
    /// At most `options.workers` acquisitions run at once. Each ID reaches
    /// exactly one terminal outcome, and the returned counters sum to
    /// `ids.len()`. Per-item failures are counted rather than returned.
    ///
    /// # Errors
    /// Returns an error only when the destination directory cannot be
    /// created.
    pub fn run(&self, ids: &[ArtifactId], options: &BatchOptions) -> BatchResult<BatchReport> {
        ensure_dir_exists(&options.dest_dir).with_context(|| {
            format!("failed to create output directory {}", options.dest_dir)
        })?;

        let started = Instant::now();
        let workers = options.workers.get().min(ids.len());
        info!(
            target: BATCH_TARGET,
            total = ids.len(),
            workers,
            dest = %options.dest_dir,
            "starting batch"
        );

        let mut stats = BatchStats::default();
        let mut progress = Progress::new(ids.len());
        let queue = Mutex::new(ids.iter());
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for _ in 0..workers {
                let sender = tx.clone();
                let shared_queue = &queue;
                scope.spawn(move || {
                    self.drain(shared_queue, &options.dest_dir, options.skip_existing, &sender);
                });
            }
            drop(tx);

            for (id, outcome) in rx {
                log_outcome(id, &outcome);
                stats.record(id, &outcome);
                progress.advance(&stats);
            }
        });

        let report = BatchReport::new(stats, started.elapsed());
        debug!(
            target: BATCH_TARGET,
            success = report.stats.success,
            skipped = report.stats.skipped,
            failed = report.stats.failed,
            "batch complete"
        );
        Ok(report)
    }

    fn drain<'ids>(
        &self,
        queue: &Mutex<std::slice::Iter<'ids, ArtifactId>>,
        dest_dir: &Utf8Path,
        skip_existing: bool,
        tx: &mpsc::Sender<(ArtifactId, FetchOutcome)>,
    ) {
        loop {
            let next = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .next()
                .copied();
            let Some(id) = next else {
                return;
            };
            let outcome = self.acquirer.acquire(id, dest_dir, skip_existing);
            if tx.send((id, outcome)).is_err() {
                return;
            }
        }
    }
}

fn log_outcome(id: ArtifactId, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Success { path } => {
            debug!(target: BATCH_TARGET, id = %id, path = %path, "downloaded");
        }
        FetchOutcome::Skipped { path } => {
            debug!(target: BATCH_TARGET, id = %id, path = %path, "skipped");
        }
        FetchOutcome::Failed(failure) => {
            warn!(
                target: BATCH_TARGET,
                id = %id,
                attempts = failure.attempts,
                "failed: {}",
                failure.reason
            );
        }
    }
}

#[cfg(test)]
mod tests;
