//! Single-item acquisition with bounded retries and atomic commit.
//!
//! Each item moves through `Pending → Attempting → {Success | RetryPending →
//! Attempting | PermanentFailure}`; `Skipped` short-circuits before any
//! remote call. Terminal states are never left.

mod commit;
mod retry;

pub use commit::CommitLock;
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryPolicy};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, warn};

use crate::artifact::{ArtifactId, DEFAULT_EXTENSION};
use crate::error::{FetchError, FetchErrorKind, FetchResult};
use crate::fs::{is_committed_file, remove_stray_temps, write_atomic};
use crate::observability::ACQUIRE_TARGET;
use crate::resolver::SharedResolver;

/// Terminal result of acquiring one light curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Freshly fetched and committed.
    Success {
        /// Final location of the file.
        path: Utf8PathBuf,
    },
    /// Already present; the archive was not contacted.
    Skipped {
        /// Location of the existing file.
        path: Utf8PathBuf,
    },
    /// Gave up after a permanent failure or an exhausted budget.
    Failed(FetchFailure),
}

/// Why an acquisition failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    /// Classification of the last error.
    pub kind: FetchErrorKind,
    /// Human-readable reason of the last error.
    pub reason: String,
    /// Number of attempts made.
    pub attempts: u32,
}

impl FetchOutcome {
    /// Path of the committed file for successful and skipped outcomes.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Success { path } | Self::Skipped { path } => Some(path),
            Self::Failed(_) => None,
        }
    }

    /// The failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&FetchFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::Success { .. } | Self::Skipped { .. } => None,
        }
    }
}

/// Fetches single light curves end to end.
///
/// The acquirer is shared by reference across workers; all of them must be
/// handed the same [`CommitLock`].
#[derive(Clone)]
pub struct Acquirer {
    resolver: SharedResolver,
    commit_lock: CommitLock,
    policy: RetryPolicy,
    extension: String,
}

impl std::fmt::Debug for Acquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquirer")
            .field("policy", &self.policy)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl Acquirer {
    /// Creates an acquirer using `resolver` and serialising commits through
    /// `commit_lock`.
    #[must_use]
    pub fn new(resolver: SharedResolver, commit_lock: CommitLock) -> Self {
        Self {
            resolver,
            commit_lock,
            policy: RetryPolicy::default(),
            extension: DEFAULT_EXTENSION.to_owned(),
        }
    }

    /// Overrides the attempt budget.
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overrides the artifact file extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Lock shared by every commit this acquirer performs.
    #[must_use]
    pub const fn commit_lock(&self) -> &CommitLock {
        &self.commit_lock
    }

    /// Canonical destination of `id` within `dest_dir`.
    #[must_use]
    pub fn target_path(&self, id: ArtifactId, dest_dir: &Utf8Path) -> Utf8PathBuf {
        dest_dir.join(id.file_name(&self.extension))
    }

    /// Acquires `id` into `dest_dir`.
    ///
    /// With `skip_existing`, an already committed file is reported as
    /// skipped without contacting the archive. Otherwise the resolver is
    /// tried up to the policy's budget, invalidating its local state before
    /// every retry. Zero candidates fail at once. On failure, leftover
    /// temporary files for `id` are removed from `dest_dir`.
    ///
    /// `dest_dir` must already exist.
    #[must_use]
    pub fn acquire(
        &self,
        id: ArtifactId,
        dest_dir: &Utf8Path,
        skip_existing: bool,
    ) -> FetchOutcome {
        let target = self.target_path(id, dest_dir);
        if skip_existing && is_committed_file(&target) {
            debug!(target: ACQUIRE_TARGET, id = %id, path = %target, "already present, skipping");
            return FetchOutcome::Skipped { path: target };
        }

        let mut attempt = 1;
        loop {
            if attempt > 1 {
                self.invalidate(id);
            }
            debug!(target: ACQUIRE_TARGET, id = %id, attempt, "attempting fetch");

            let err = match self.attempt(id, &target) {
                Ok(()) => {
                    debug!(target: ACQUIRE_TARGET, id = %id, path = %target, attempt, "committed");
                    return FetchOutcome::Success { path: target };
                }
                Err(err) => err,
            };

            match self.policy.after_failure(attempt, err.kind()) {
                RetryDecision::Retry => {
                    warn!(
                        target: ACQUIRE_TARGET,
                        id = %id,
                        attempt,
                        error = %err,
                        "transient failure, retrying"
                    );
                    attempt += 1;
                }
                RetryDecision::GiveUp => {
                    discard_temps(id, dest_dir);
                    return FetchOutcome::Failed(FetchFailure {
                        kind: err.kind(),
                        reason: err.message().to_owned(),
                        attempts: attempt,
                    });
                }
            }
        }
    }

    /// One pass of search, download and commit. Only the commit holds the
    /// lock.
    fn attempt(&self, id: ArtifactId, target: &Utf8Path) -> FetchResult<()> {
        let candidates = self.resolver.search(id)?;
        let Some(candidate) = candidates.first() else {
            return Err(FetchError::not_found());
        };
        let payload = self.resolver.download(candidate)?;

        self.commit_lock
            .run(|| write_atomic(id, target, &payload))
            .map_err(|err| FetchError::from_io(&format!("commit {target}"), &err))
    }

    fn invalidate(&self, id: ArtifactId) {
        // A failed invalidation never ends the retry loop.
        if let Err(err) = self.resolver.invalidate_local_state(id) {
            debug!(
                target: ACQUIRE_TARGET,
                id = %id,
                error = %err,
                "ignoring failed invalidation of resolver state"
            );
        }
    }
}

fn discard_temps(id: ArtifactId, dest_dir: &Utf8Path) {
    match remove_stray_temps(id, dest_dir) {
        Ok(0) => {}
        Ok(removed) => {
            debug!(target: ACQUIRE_TARGET, id = %id, removed, "removed stray temporary files");
        }
        Err(err) => {
            warn!(
                target: ACQUIRE_TARGET,
                id = %id,
                error = %err,
                "failed to remove stray temporary files"
            );
        }
    }
}
