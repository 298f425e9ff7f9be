//! Cache lookup and insertion.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::Context;
use std::fs;
use std::time::{Duration, SystemTime};
use tracing::debug;

use super::config::CacheConfig;
use super::lock::CacheLock;
use crate::artifact::{ArtifactId, DEFAULT_EXTENSION};
use crate::error::CacheResult;
use crate::fs::{copy_atomic, ensure_dir_exists};
use crate::observability::CACHE_TARGET;

/// Content-addressed, expiring store of light curve files.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use lightcurve_acquire::ArtifactId;
/// use lightcurve_acquire::cache::{ArtifactCache, CacheConfig};
///
/// let cache = ArtifactCache::new(CacheConfig::default());
/// let id = ArtifactId::new(10_797_460).expect("non-zero id");
/// if cache.lookup(id).is_none() {
///     cache.insert(id, Utf8Path::new("/tmp/download.fits"))?;
/// }
/// # Ok::<(), lightcurve_acquire::CacheError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    pub(super) root: Utf8PathBuf,
    ttl: Duration,
    pub(super) extension: String,
}

impl ArtifactCache {
    /// Creates a cache rooted at the configured directory.
    ///
    /// The directory is created lazily on first insert.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            root: config.cache_dir,
            ttl: config.ttl,
            extension: DEFAULT_EXTENSION.to_owned(),
        }
    }

    /// Overrides the artifact file extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Expiry window applied by [`Self::lookup`].
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Canonical location of `id` within the store.
    #[must_use]
    pub fn path_for(&self, id: ArtifactId) -> Utf8PathBuf {
        self.root.join(id.file_name(&self.extension))
    }

    /// Returns the cached path for `id` when present and younger than the
    /// expiry window.
    #[must_use]
    pub fn lookup(&self, id: ArtifactId) -> Option<Utf8PathBuf> {
        self.lookup_at(id, SystemTime::now())
    }

    /// Performs [`Self::lookup`] as if the current time were `now`.
    ///
    /// An entry written at `T` is a hit for every `now` in `[T, T + ttl)` and
    /// a miss from `T + ttl` onwards.
    #[must_use]
    pub fn lookup_at(&self, id: ArtifactId, now: SystemTime) -> Option<Utf8PathBuf> {
        let path = self.path_for(id);
        let Some(age) = entry_age(&path, now) else {
            debug!(target: CACHE_TARGET, id = %id, path = %path, "cache miss");
            return None;
        };

        if age < self.ttl {
            debug!(target: CACHE_TARGET, id = %id, path = %path, "cache hit");
            Some(path)
        } else {
            debug!(
                target: CACHE_TARGET,
                id = %id,
                age_secs = age.as_secs(),
                "cache entry expired"
            );
            None
        }
    }

    /// Copies `source` into the store as the entry for `id` and returns the
    /// entry's path.
    ///
    /// The copy is staged in a temporary file inside the store and renamed
    /// into place, so the canonical path never exposes a partial file. The
    /// fresh copy resets the entry's age.
    ///
    /// # Errors
    ///
    /// Returns an error if the store directory cannot be created, the per-ID
    /// lock cannot be taken, or the copy fails.
    pub fn insert(&self, id: ArtifactId, source: &Utf8Path) -> CacheResult<Utf8PathBuf> {
        ensure_dir_exists(&self.root)
            .with_context(|| format!("failed to create cache directory {}", self.root))?;
        let _lock = CacheLock::acquire_exclusive(&self.root, id)
            .with_context(|| format!("failed to lock cache entry for {id}"))?;

        let target = self.path_for(id);
        let bytes = copy_atomic(id, source, &target)
            .with_context(|| format!("failed to copy {source} into cache as {target}"))?;

        debug!(
            target: CACHE_TARGET,
            id = %id,
            path = %target,
            bytes,
            "cache entry stored"
        );
        Ok(target)
    }
}

/// Age of the file at `path` relative to `now`, or `None` when no regular
/// file exists there.
///
/// Modification times in the future count as age zero.
pub(super) fn entry_age(path: &Utf8Path, now: SystemTime) -> Option<Duration> {
    let metadata = fs::metadata(path).ok().filter(fs::Metadata::is_file)?;
    let modified = metadata.modified().ok()?;
    Some(now.duration_since(modified).unwrap_or(Duration::ZERO))
}
