//! Request-time resolution of a light curve to a local file.
//!
//! Tiers are consulted in a fixed order and the first match wins:
//! curated store, development store, cache, then the remote archive. Only
//! the remote tier writes anything; files found in the first three tiers
//! are returned as-is without validation.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use tracing::debug;

use crate::acquire::CommitLock;
use crate::artifact::{ArtifactId, DEFAULT_EXTENSION};
use crate::cache::ArtifactCache;
use crate::error::{CacheError, FetchError, FetchResult};
use crate::fs::{ensure_dir_exists, is_committed_file, temp_file_for};
use crate::observability::LOCATOR_TARGET;
use crate::resolver::SharedResolver;

/// Where a located file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Read-only curated store.
    Curated,
    /// Read-only development store.
    Development,
    /// Fresh entry in the cache store.
    Cache,
    /// Fetched from the archive during this call.
    Remote,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Curated => "curated",
            Self::Development => "development",
            Self::Cache => "cache",
            Self::Remote => "remote",
        })
    }
}

/// A resolved local path and the tier that supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Located {
    /// Local file holding the light curve.
    pub path: Utf8PathBuf,
    /// Tier that matched.
    pub tier: Tier,
}

/// Resolves IDs through the curated, development, cache and remote tiers.
#[derive(Clone)]
pub struct TieredLocator {
    curated_root: Option<Utf8PathBuf>,
    dev_root: Option<Utf8PathBuf>,
    cache: ArtifactCache,
    resolver: SharedResolver,
    commit_lock: CommitLock,
    extension: String,
}

impl fmt::Debug for TieredLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredLocator")
            .field("curated_root", &self.curated_root)
            .field("dev_root", &self.dev_root)
            .field("cache", &self.cache)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl TieredLocator {
    /// Locator backed only by `cache` and `resolver`.
    #[must_use]
    pub fn new(cache: ArtifactCache, resolver: SharedResolver, commit_lock: CommitLock) -> Self {
        Self {
            curated_root: None,
            dev_root: None,
            cache,
            resolver,
            commit_lock,
            extension: DEFAULT_EXTENSION.to_owned(),
        }
    }

    /// Adds the curated store.
    #[must_use]
    pub fn with_curated_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.curated_root = Some(root.into());
        self
    }

    /// Adds the development store.
    #[must_use]
    pub fn with_dev_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.dev_root = Some(root.into());
        self
    }

    /// Overrides the extension used for the curated and development stores.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Resolves `id` to a local file.
    ///
    /// # Errors
    /// Returns [`FetchError`] when the remote tier is reached and the
    /// archive has no light curve for `id`, the download fails, or the
    /// result cannot be stored in the cache.
    pub fn locate(&self, id: ArtifactId) -> FetchResult<Located> {
        let file_name = id.file_name(&self.extension);
        let read_only = [
            (self.curated_root.as_deref(), Tier::Curated),
            (self.dev_root.as_deref(), Tier::Development),
        ];
        for (root, tier) in read_only {
            let hit = root
                .map(|dir| dir.join(&file_name))
                .filter(|path| is_committed_file(path));
            if let Some(path) = hit {
                return Ok(found(id, path, tier));
            }
        }

        if let Some(path) = self.cache.lookup(id) {
            return Ok(found(id, path, Tier::Cache));
        }

        let path = self.fetch_into_cache(id)?;
        Ok(found(id, path, Tier::Remote))
    }

    fn fetch_into_cache(&self, id: ArtifactId) -> FetchResult<Utf8PathBuf> {
        let candidates = self.resolver.search(id)?;
        let Some(candidate) = candidates.first() else {
            return Err(FetchError::not_found());
        };
        let payload = self.resolver.download(candidate)?;

        self.commit_lock.run(|| -> FetchResult<Utf8PathBuf> {
            let root = self.cache.root();
            ensure_dir_exists(root).map_err(CacheError::from)?;
            let mut staged = temp_file_for(id, root)
                .map_err(|err| FetchError::from_io(&format!("stage {id} in {root}"), &err))?;
            staged
                .write_all(&payload)
                .map_err(|err| FetchError::from_io(&format!("stage {id} in {root}"), &err))?;
            let staged_path = Utf8Path::from_path(staged.path())
                .ok_or_else(|| FetchError::other(format!("non UTF-8 staging path in {root}")))?;
            self.cache
                .insert(id, staged_path)
                .map_err(FetchError::from)
        })
    }
}

fn found(id: ArtifactId, path: Utf8PathBuf, tier: Tier) -> Located {
    debug!(target: LOCATOR_TARGET, id = %id, path = %path, tier = %tier, "located");
    Located { path, tier }
}
