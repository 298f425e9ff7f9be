//! Expiring on-disk cache for fetched light curves.
//!
//! Entries live at `{root}/{id}.{ext}` and are judged fresh by their
//! modification time. Lookups never delete anything; expired files stay on
//! disk until an explicit [`ArtifactCache::evict`].
//!
//! # Cache Location
//!
//! The cache directory is resolved in the following order:
//!
//! 1. `LCACQ_CACHE_DIR` environment variable if set
//! 2. `$XDG_CACHE_HOME/lightcurve-acquire/lightcurves` if `XDG_CACHE_HOME` is set
//! 3. `~/.cache/lightcurve-acquire/lightcurves` as fallback
//!
//! # Concurrency
//!
//! Operations on distinct IDs are independent. Mutations of the same ID are
//! serialised with a per-ID file lock. A full clear is a maintenance
//! operation and must not run while inserts are in flight.

mod config;
mod eviction;
mod lock;
mod store;

pub use config::{CacheConfig, DEFAULT_CACHE_TTL, resolve_cache_dir, resolve_download_dir};
pub use eviction::{CacheStats, EvictionSummary};
pub use lock::CacheLock;
pub use store::ArtifactCache;
