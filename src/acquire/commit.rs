//! Process-wide serialisation of the final write.

use std::sync::{Arc, Mutex, PoisonError};

/// Injectable mutual-exclusion handle guarding the "write payload, rename
/// into place" critical section.
///
/// Clones share one lock. The orchestrator owns a single handle and passes
/// it to every worker; searches and downloads never hold it.
#[derive(Debug, Clone, Default)]
pub struct CommitLock {
    inner: Arc<Mutex<()>>,
}

impl CommitLock {
    /// Creates an independent lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `critical` while holding the lock.
    ///
    /// Poisoning left by a panicked holder is ignored.
    pub fn run<T>(&self, critical: impl FnOnce() -> T) -> T {
        let _guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        critical()
    }

    /// Returns `true` when both handles guard the same critical section.
    #[must_use]
    pub fn shares_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
