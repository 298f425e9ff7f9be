//! Scripted in-memory resolver for exercising retry and batch behaviour
//! without network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::artifact::ArtifactId;
use crate::error::{FetchError, FetchResult};
use crate::resolver::{Candidate, RemoteResolver};

/// Behaviour of one scripted attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Search finds one candidate and download returns these bytes.
    Payload(Vec<u8>),
    /// Search succeeds with zero candidates.
    NoCandidates,
    /// Search fails with this error.
    SearchError(FetchError),
    /// Search finds one candidate; download fails with this error.
    DownloadError(FetchError),
}

/// Returns a small payload with a valid FITS signature naming `id`.
#[must_use]
pub fn fits_payload(id: ArtifactId) -> Vec<u8> {
    format!("SIMPLE  =                    T / light curve {id}").into_bytes()
}

/// Resolver replaying per-ID scripts.
///
/// Attempt `n` for an ID uses step `n` of its script; once the script runs
/// out its last step repeats. IDs without a script succeed with
/// [`fits_payload`].
#[derive(Debug, Default)]
pub struct ScriptedResolver {
    scripts: HashMap<ArtifactId, Vec<Step>>,
    attempts: Mutex<HashMap<ArtifactId, usize>>,
    latency: Duration,
    failing_invalidation: bool,
    searches: AtomicUsize,
    downloads: AtomicUsize,
    invalidations: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedResolver {
    /// Resolver where every ID succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the script for `id`.
    #[must_use]
    pub fn script(mut self, id: ArtifactId, steps: Vec<Step>) -> Self {
        self.scripts.insert(id, steps);
        self
    }

    /// Makes every download sleep for `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes every invalidation report an error.
    #[must_use]
    pub const fn with_failing_invalidation(mut self) -> Self {
        self.failing_invalidation = true;
        self
    }

    /// Total `search` calls.
    #[must_use]
    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// Total `download` calls.
    #[must_use]
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Total `invalidate_local_state` calls.
    #[must_use]
    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    /// Highest number of downloads observed running at once.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Number of searches made for `id`.
    #[must_use]
    pub fn attempts_for(&self, id: ArtifactId) -> usize {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    fn step(&self, id: ArtifactId, attempt: usize) -> Step {
        let Some(steps) = self.scripts.get(&id) else {
            return Step::Payload(fits_payload(id));
        };
        steps
            .get(attempt)
            .or_else(|| steps.last())
            .cloned()
            .unwrap_or_else(|| Step::Payload(fits_payload(id)))
    }

    fn next_attempt(&self, id: ArtifactId) -> usize {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let counter = attempts.entry(id).or_insert(0);
        let current = *counter;
        *counter += 1;
        current
    }
}

impl RemoteResolver for ScriptedResolver {
    fn search(&self, id: ArtifactId) -> FetchResult<Vec<Candidate>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let attempt = self.next_attempt(id);
        match self.step(id, attempt) {
            Step::NoCandidates => Ok(Vec::new()),
            Step::SearchError(err) => Err(err),
            Step::Payload(_) | Step::DownloadError(_) => Ok(vec![Candidate {
                id,
                product: format!("attempt-{attempt}"),
                url: format!("scripted://{id}/{attempt}"),
            }]),
        }
    }

    fn download(&self, candidate: &Candidate) -> FetchResult<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let attempt = candidate
            .product
            .strip_prefix("attempt-")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0);
        match self.step(candidate.id, attempt) {
            Step::Payload(bytes) => Ok(bytes),
            Step::DownloadError(err) => Err(err),
            Step::NoCandidates | Step::SearchError(_) => Err(FetchError::other(format!(
                "unexpected download of {}",
                candidate.url
            ))),
        }
    }

    fn invalidate_local_state(&self, id: ArtifactId) -> FetchResult<()> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        if self.failing_invalidation {
            Err(FetchError::other(format!("cannot invalidate {id}")))
        } else {
            Ok(())
        }
    }
}
