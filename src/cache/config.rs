//! Configuration for the light curve cache.
//!
//! Resolves the cache directory from environment variables with XDG-compliant
//! fallback paths.

use camino::Utf8PathBuf;
use std::time::Duration;

/// Application directory within the XDG cache home.
const APP_SUBDIR: &str = "lightcurve-acquire";

/// Subdirectory holding cached light curves.
const CACHE_SUBDIR: &str = "lightcurves";

/// Subdirectory holding the remote resolver's private downloads.
const DOWNLOADS_SUBDIR: &str = "downloads";

/// Environment variable overriding the cache directory.
const CACHE_DIR_ENV: &str = "LCACQ_CACHE_DIR";

/// Default age after which cache entries stop being served.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for the light curve cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory for cached light curves.
    pub cache_dir: Utf8PathBuf,
    /// Entries older than this are treated as misses.
    pub ttl: Duration,
}

impl CacheConfig {
    /// Creates a configuration using the resolved cache directory and the
    /// default expiry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dir(resolve_cache_dir())
    }

    /// Creates a configuration with a custom directory.
    #[must_use]
    pub const fn with_dir(cache_dir: Utf8PathBuf) -> Self {
        Self {
            cache_dir,
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Overrides the expiry window.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves the light curve cache directory from environment and XDG
/// conventions.
///
/// The resolution order is:
///
/// 1. `LCACQ_CACHE_DIR` environment variable if set and valid UTF-8
/// 2. `$XDG_CACHE_HOME/lightcurve-acquire/lightcurves` if `XDG_CACHE_HOME` is set
/// 3. `~/.cache/lightcurve-acquire/lightcurves` as fallback
/// 4. `/tmp/lightcurve-acquire/lightcurves` as last resort
#[must_use]
pub fn resolve_cache_dir() -> Utf8PathBuf {
    non_blank_env_path(CACHE_DIR_ENV).unwrap_or_else(|| resolve_app_dir().join(CACHE_SUBDIR))
}

/// Resolves the directory where the remote resolver keeps its own
/// downloads, following steps 2 to 4 of [`resolve_cache_dir`].
#[must_use]
pub fn resolve_download_dir() -> Utf8PathBuf {
    resolve_app_dir().join(DOWNLOADS_SUBDIR)
}

fn resolve_app_dir() -> Utf8PathBuf {
    non_blank_env_path("XDG_CACHE_HOME")
        .or_else(home_cache_dir)
        .unwrap_or_else(|| Utf8PathBuf::from("/tmp"))
        .join(APP_SUBDIR)
}

/// Value of `name` as a path, ignoring unset, blank and non-UTF-8 values.
fn non_blank_env_path(name: &str) -> Option<Utf8PathBuf> {
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| Utf8PathBuf::from(trimmed))
}

fn home_cache_dir() -> Option<Utf8PathBuf> {
    let home = Utf8PathBuf::from_path_buf(dirs::home_dir()?).ok()?;
    Some(home.join(".cache"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use temp_env::with_vars;

    const XDG: &str = "/home/astro/.cache";

    #[rstest]
    #[case::explicit(Some("/custom/cache/path"), Some(XDG), "/custom/cache/path")]
    #[case::xdg(None, Some(XDG), "/home/astro/.cache/lightcurve-acquire/lightcurves")]
    #[case::blank_override(
        Some("   "),
        Some(XDG),
        "/home/astro/.cache/lightcurve-acquire/lightcurves"
    )]
    #[case::padded_override(Some("  /srv/lc  "), None, "/srv/lc")]
    fn cache_dir_resolution_order(
        #[case] explicit: Option<&str>,
        #[case] xdg: Option<&str>,
        #[case] expected: &str,
    ) {
        let resolved = with_vars(
            [(CACHE_DIR_ENV, explicit), ("XDG_CACHE_HOME", xdg)],
            resolve_cache_dir,
        );
        assert_eq!(resolved, expected);
    }

    #[test]
    fn blank_xdg_cache_home_falls_back_to_home_or_tmp() {
        let resolved = with_vars(
            [(CACHE_DIR_ENV, None), ("XDG_CACHE_HOME", Some(" "))],
            resolve_cache_dir,
        );
        assert!(resolved.ends_with("lightcurve-acquire/lightcurves"));
        assert!(resolved.is_absolute(), "unexpected {resolved}");
    }

    #[test]
    fn download_dir_ignores_the_cache_override() {
        let resolved = with_vars(
            [(CACHE_DIR_ENV, Some("/elsewhere")), ("XDG_CACHE_HOME", Some(XDG))],
            resolve_download_dir,
        );
        assert_eq!(resolved, "/home/astro/.cache/lightcurve-acquire/downloads");
    }

    #[test]
    fn cache_config_defaults_to_one_day_expiry() {
        let config = CacheConfig::with_dir(Utf8PathBuf::from("/custom/path"));
        assert_eq!(config.ttl, Duration::from_secs(86_400));
        assert_eq!(config.cache_dir, "/custom/path");
        assert_eq!(config.with_ttl(Duration::ZERO).ttl, Duration::ZERO);
    }
}
