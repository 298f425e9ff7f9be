//! Age-based eviction, full clears and occupancy reporting.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, eyre};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use super::lock::CacheLock;
use super::store::{ArtifactCache, entry_age};
use crate::artifact::ArtifactId;
use crate::cleanup_helpers::remove_tree;
use crate::error::CacheResult;
use crate::fs::ensure_dir_exists;
use crate::observability::CACHE_TARGET;

/// Outcome of an eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionSummary {
    /// Number of entries removed. A full clear reports the entries present
    /// before the clear.
    pub removed: usize,
}

/// Occupancy of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of committed entries.
    pub count: usize,
    /// Combined size of committed entries in bytes.
    pub total_bytes: u64,
    /// Root directory of the store.
    pub root: Utf8PathBuf,
}

impl ArtifactCache {
    /// Removes entries from the store.
    ///
    /// With `None`, the whole store is deleted and an empty root recreated;
    /// this must not overlap with inserts. With `Some(age)`, only entries
    /// older than `age` are removed, each under its per-ID lock.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be scanned, cleared or
    /// recreated, or when an expired entry cannot be removed.
    pub fn evict(&self, older_than: Option<Duration>) -> CacheResult<EvictionSummary> {
        self.evict_at(older_than, SystemTime::now())
    }

    /// Performs [`Self::evict`] as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::evict`].
    pub fn evict_at(
        &self,
        older_than: Option<Duration>,
        now: SystemTime,
    ) -> CacheResult<EvictionSummary> {
        match older_than {
            None => self.clear(),
            Some(threshold) => self.evict_older_than(threshold, now),
        }
    }

    /// Reports entry count, combined size and root path.
    ///
    /// # Errors
    ///
    /// Returns an error when the store directory exists but cannot be read.
    pub fn stats(&self) -> CacheResult<CacheStats> {
        let mut count = 0;
        let mut total_bytes = 0;
        for (_, path) in self.entries()? {
            let Ok(metadata) = fs::metadata(&path) else {
                continue;
            };
            if metadata.is_file() {
                count += 1;
                total_bytes += metadata.len();
            }
        }
        Ok(CacheStats {
            count,
            total_bytes,
            root: self.root.clone(),
        })
    }

    fn clear(&self) -> CacheResult<EvictionSummary> {
        let removed = self.entries()?.len();
        remove_tree(&self.root)
            .with_context(|| format!("failed to clear cache directory {}", self.root))?;
        ensure_dir_exists(&self.root)
            .with_context(|| format!("failed to recreate cache directory {}", self.root))?;
        info!(target: CACHE_TARGET, root = %self.root, removed, "cache cleared");
        Ok(EvictionSummary { removed })
    }

    fn evict_older_than(
        &self,
        threshold: Duration,
        now: SystemTime,
    ) -> CacheResult<EvictionSummary> {
        let mut removed = 0;
        for (id, path) in self.entries()? {
            if self.evict_entry(id, &path, threshold, now)? {
                removed += 1;
            }
        }
        info!(
            target: CACHE_TARGET,
            root = %self.root,
            removed,
            threshold_secs = threshold.as_secs(),
            "expired cache entries evicted"
        );
        Ok(EvictionSummary { removed })
    }

    /// Removes one entry if it is still older than `threshold` once its lock
    /// is held; a concurrent re-insert makes it fresh again.
    fn evict_entry(
        &self,
        id: ArtifactId,
        path: &Utf8Path,
        threshold: Duration,
        now: SystemTime,
    ) -> CacheResult<bool> {
        let lock = CacheLock::acquire_exclusive(&self.root, id)
            .with_context(|| format!("failed to lock cache entry for {id}"))?;
        let Some(age) = entry_age(path, now) else {
            return Ok(false);
        };
        if age <= threshold {
            return Ok(false);
        }
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(target: CACHE_TARGET, id = %id, path = %path, "evicted cache entry");
                if let Err(err) = lock.retire() {
                    debug!(
                        target: CACHE_TARGET,
                        id = %id,
                        error = %err,
                        "failed to remove lock file of evicted entry"
                    );
                }
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(eyre!(err)
                .wrap_err(format!("failed to evict cache entry {path}"))
                .into()),
        }
    }

    /// Lists canonical entries, ignoring locks, temporaries and foreign files.
    fn entries(&self) -> CacheResult<Vec<(ArtifactId, Utf8PathBuf)>> {
        let dir_entries = match fs::read_dir(&self.root) {
            Ok(dir_entries) => dir_entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(eyre!(err)
                    .wrap_err(format!("failed to read cache directory {}", self.root))
                    .into());
            }
        };

        let mut entries = Vec::new();
        for dir_entry in dir_entries {
            let entry = dir_entry
                .with_context(|| format!("failed to read cache directory {}", self.root))?;
            let name = entry.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|name| ArtifactId::from_file_name(name, &self.extension))
            else {
                continue;
            };
            entries.push((id, self.path_for(id)));
        }
        Ok(entries)
    }
}
