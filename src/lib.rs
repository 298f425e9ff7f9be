//! Concurrent, cache-aware acquisition of Kepler light curve files.
//!
//! The crate resolves catalogue IDs to local FITS files. A batch driver
//! fans IDs out over a bounded worker pool, retrying transient archive
//! failures and committing each file atomically. A tiered locator serves
//! single requests from curated, development and cached copies before
//! falling back to the archive.

pub mod acquire;
mod app;
mod artifact;
pub mod batch;
pub mod cache;
mod cleanup_helpers;
mod error;
mod fs;
pub mod input;
pub mod locator;
mod observability;
pub mod resolver;
#[doc(hidden)]
pub mod test_support;

pub use acquire::{Acquirer, CommitLock, FetchFailure, FetchOutcome, RetryPolicy};
pub use app::{Cli, DEFAULT_ERROR_LOG, RunOutcome, execute, run};
pub use artifact::{ArtifactId, DEFAULT_EXTENSION, ParseArtifactIdError};
pub use batch::{BatchOptions, BatchOrchestrator, BatchReport, BatchStats};
pub use error::{
    AcquireError, BatchError, BatchResult, CacheError, CacheResult, ConfigError, ConfigResult,
    FetchError, FetchErrorKind, FetchResult, InputError, InputResult, NOT_FOUND_REASON, Result,
};
pub use locator::{Located, Tier, TieredLocator};
pub use observability::init_tracing;
pub use resolver::{Candidate, MastResolver, RemoteResolver, SharedResolver};

use color_eyre::eyre::eyre;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::cache::{ArtifactCache, CacheConfig, DEFAULT_CACHE_TTL, resolve_cache_dir};
use crate::resolver::MastResolverConfig;
use camino::Utf8PathBuf;

const SECS_PER_HOUR: u64 = 60 * 60;

/// Captures acquisition settings supplied via environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, OrthoConfig, Default)]
#[ortho_config(prefix = "LCACQ")]
///
/// # Examples
/// ```
/// use lightcurve_acquire::AcquireEnvCfg;
///
/// let cfg = AcquireEnvCfg::default();
/// assert!(cfg.cache_dir.is_none());
/// assert_eq!(cfg.extension(), "fits");
/// ```
pub struct AcquireEnvCfg {
    /// Cache store root; resolved from the XDG cache home when absent.
    pub cache_dir: Option<Utf8PathBuf>,
    /// Hours a cache entry stays fresh.
    pub cache_ttl_hours: Option<u64>,
    /// Read-only curated store consulted first by the locator.
    pub curated_dir: Option<Utf8PathBuf>,
    /// Read-only development store consulted second by the locator.
    pub dev_dir: Option<Utf8PathBuf>,
    /// Directory for the archive resolver's own downloads.
    pub resolver_cache_dir: Option<Utf8PathBuf>,
    /// Root URL of the light curve archive.
    pub archive_url: Option<String>,
    /// Attempts per light curve, including the first.
    pub max_attempts: Option<u32>,
    /// Artifact file extension.
    pub extension: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub http_timeout_secs: Option<u64>,
}

impl AcquireEnvCfg {
    /// Loads configuration from environment variables without parsing CLI arguments.
    ///
    /// # Errors
    /// Returns an error when a variable holds a value of the wrong type.
    pub fn load() -> ConfigResult<Self> {
        let args = [OsString::from("lightcurve-acquire")];
        Self::load_from_iter(args).map_err(|err| ConfigError::from(eyre!(err)))
    }

    /// Artifact file extension, defaulting to [`DEFAULT_EXTENSION`].
    #[must_use]
    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or(DEFAULT_EXTENSION)
    }

    /// Cache store settings.
    #[must_use]
    pub fn cache_config(&self) -> CacheConfig {
        let dir = self.cache_dir.clone().unwrap_or_else(resolve_cache_dir);
        let ttl = self.cache_ttl_hours.map_or(DEFAULT_CACHE_TTL, |hours| {
            Duration::from_secs(hours.saturating_mul(SECS_PER_HOUR))
        });
        CacheConfig::with_dir(dir).with_ttl(ttl)
    }

    /// Cache store built from [`Self::cache_config`].
    #[must_use]
    pub fn cache(&self) -> ArtifactCache {
        ArtifactCache::new(self.cache_config()).with_extension(self.extension())
    }

    /// Archive resolver settings.
    #[must_use]
    pub fn resolver_config(&self) -> MastResolverConfig {
        let mut config = MastResolverConfig::default();
        if let Some(ref url) = self.archive_url {
            config.base_url.clone_from(url);
        }
        if let Some(ref dir) = self.resolver_cache_dir {
            config.download_dir.clone_from(dir);
        }
        if let Some(secs) = self.http_timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    /// Attempt budget for each light curve.
    ///
    /// # Errors
    /// Returns an error when `max_attempts` is zero.
    pub fn retry_policy(&self) -> ConfigResult<RetryPolicy> {
        let Some(raw) = self.max_attempts else {
            return Ok(RetryPolicy::default());
        };
        let attempts = NonZeroU32::new(raw)
            .ok_or_else(|| eyre!("LCACQ_MAX_ATTEMPTS must be at least 1"))?;
        Ok(RetryPolicy::new(attempts))
    }

    /// Locator wired to the configured stores, cache and `resolver`.
    #[must_use]
    pub fn locator(&self, resolver: SharedResolver, commit_lock: CommitLock) -> TieredLocator {
        let mut locator = TieredLocator::new(self.cache(), resolver, commit_lock)
            .with_extension(self.extension());
        if let Some(ref dir) = self.curated_dir {
            locator = locator.with_curated_root(dir.clone());
        }
        if let Some(ref dir) = self.dev_dir {
            locator = locator.with_dev_root(dir.clone());
        }
        locator
    }
}
