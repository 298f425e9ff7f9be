//! HTTP resolver for the Kepler light curve archive.
//!
//! The archive publishes one directory per target at
//! `{base}/{id9[0..4]}/{id9}/`, where `id9` is the nine-digit zero-padded
//! catalog ID. Long-cadence light curves are listed as
//! `kplr{id9}-{stamp}_llc.fits`.
//!
//! Downloads are kept in a private per-target directory so repeated runs do
//! not hit the network. A corrupted file there poisons every later attempt
//! until [`RemoteResolver::invalidate_local_state`] removes it.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::Context;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::fs;
use std::io::ErrorKind;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Candidate, RemoteResolver};
use crate::artifact::ArtifactId;
use crate::cache::resolve_download_dir;
use crate::cleanup_helpers::remove_tree;
use crate::error::{ConfigResult, FetchError, FetchResult};
use crate::fs::{ensure_dir_exists, write_atomic};
use crate::observability::RESOLVER_TARGET;

/// Public Kepler long-cadence light curve tree.
pub const DEFAULT_ARCHIVE_URL: &str = "https://archive.stsci.edu/pub/kepler/lightcurves";

/// Leading bytes of every FITS primary header.
const FITS_SIGNATURE: &[u8] = b"SIMPLE";

/// Suffix of long-cadence light curve products.
const LONG_CADENCE_SUFFIX: &str = "_llc.fits";

/// Settings for [`MastResolver`].
#[derive(Debug, Clone)]
pub struct MastResolverConfig {
    /// Root URL of the light curve tree.
    pub base_url: String,
    /// Directory holding the resolver's own downloads.
    pub download_dir: Utf8PathBuf,
    /// Per-request transport timeout.
    pub timeout: Duration,
}

impl Default for MastResolverConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ARCHIVE_URL.to_owned(),
            download_dir: resolve_download_dir(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// [`RemoteResolver`] backed by the archive's static directory listings.
#[derive(Debug, Clone)]
pub struct MastResolver {
    config: MastResolverConfig,
    client: Client,
}

impl MastResolver {
    /// Builds a resolver with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be initialised.
    pub fn new(config: MastResolverConfig) -> ConfigResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build archive HTTP client")?;
        Ok(Self { config, client })
    }

    /// Directory listing URL for `id`.
    #[must_use]
    pub fn target_url(&self, id: ArtifactId) -> String {
        let padded = padded_id(id);
        let group = padded.get(..4).unwrap_or(padded.as_str());
        format!(
            "{}/{group}/{padded}/",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn target_dir(&self, id: ArtifactId) -> Utf8PathBuf {
        self.config
            .download_dir
            .join(format!("kplr{}", padded_id(id)))
    }

    fn local_copy(&self, candidate: &Candidate) -> Utf8PathBuf {
        self.target_dir(candidate.id).join(&candidate.product)
    }

    fn fetch(&self, url: &str) -> FetchResult<reqwest::blocking::Response> {
        self.client
            .get(url)
            .send()
            .map_err(|err| classify_transport(url, &err))
    }

    fn keep_local_copy(&self, candidate: &Candidate, path: &Utf8Path, payload: &[u8]) {
        let stored = ensure_dir_exists(&self.target_dir(candidate.id))
            .and_then(|()| {
                write_atomic(candidate.id, path, payload)
                    .with_context(|| format!("write {path}"))
            });
        if let Err(err) = stored {
            warn!(
                target: RESOLVER_TARGET,
                id = %candidate.id,
                error = %err,
                "failed to keep local copy of download"
            );
        }
    }
}

impl RemoteResolver for MastResolver {
    fn search(&self, id: ArtifactId) -> FetchResult<Vec<Candidate>> {
        let url = self.target_url(id);
        let response = self.fetch(&url)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(target: RESOLVER_TARGET, id = %id, url = %url, "no archive directory");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(classify_status(&url, status));
        }
        let listing = response
            .text()
            .map_err(|err| classify_transport(&url, &err))?;
        let candidates = parse_listing(id, &url, &listing);
        debug!(
            target: RESOLVER_TARGET,
            id = %id,
            candidates = candidates.len(),
            "archive search complete"
        );
        Ok(candidates)
    }

    fn download(&self, candidate: &Candidate) -> FetchResult<Vec<u8>> {
        let path = self.local_copy(candidate);
        if let Some(bytes) = read_local_copy(candidate, &path)? {
            return Ok(bytes);
        }

        let response = self.fetch(&candidate.url)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(&candidate.url, status));
        }
        let payload = response
            .bytes()
            .map_err(|err| classify_transport(&candidate.url, &err))?
            .to_vec();
        check_signature(&payload, &candidate.url)?;
        self.keep_local_copy(candidate, &path, &payload);
        Ok(payload)
    }

    fn invalidate_local_state(&self, id: ArtifactId) -> FetchResult<()> {
        let dir = self.target_dir(id);
        let outcome = remove_tree(&dir)
            .map_err(|err| FetchError::from_io(&format!("remove {dir}"), &err))?;
        debug!(target: RESOLVER_TARGET, id = %id, ?outcome, "local download state invalidated");
        Ok(())
    }
}

fn read_local_copy(candidate: &Candidate, path: &Utf8Path) -> FetchResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => {
            debug!(
                target: RESOLVER_TARGET,
                id = %candidate.id,
                path = %path,
                "serving download from local copy"
            );
            check_signature(&bytes, path.as_str())?;
            Ok(Some(bytes))
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(FetchError::from_io(&format!("read {path}"), &err)),
    }
}

fn padded_id(id: ArtifactId) -> String {
    format!("{:09}", id.get())
}

/// Extracts long-cadence products for `id` from an HTML directory listing.
///
/// Products are returned sorted by name, which orders them by observing
/// quarter.
fn parse_listing(id: ArtifactId, dir_url: &str, listing: &str) -> Vec<Candidate> {
    let prefix = format!("kplr{}-", padded_id(id));
    let mut products: Vec<&str> = listing
        .split("href=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .filter_map(|href| href.rsplit('/').next())
        .filter(|name| name.starts_with(&prefix) && name.ends_with(LONG_CADENCE_SUFFIX))
        .collect();
    products.sort_unstable();
    products.dedup();
    products
        .into_iter()
        .map(|product| Candidate {
            id,
            product: product.to_owned(),
            url: format!("{dir_url}{product}"),
        })
        .collect()
}

fn check_signature(payload: &[u8], origin: &str) -> FetchResult<()> {
    if payload.starts_with(FITS_SIGNATURE) {
        Ok(())
    } else {
        Err(FetchError::transient(format!(
            "corrupt payload from {origin}: missing FITS header ({} bytes)",
            payload.len()
        )))
    }
}

fn classify_transport(url: &str, err: &reqwest::Error) -> FetchError {
    let message = format!("request to {url} failed: {err}");
    if err.is_timeout() || err.is_connect() || err.is_body() || err.is_decode() || err.is_request()
    {
        FetchError::transient(message)
    } else {
        FetchError::other(message)
    }
}

fn classify_status(url: &str, status: StatusCode) -> FetchError {
    let message = format!("archive returned {status} for {url}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchError::transient(message)
    } else {
        FetchError::other(message)
    }
}
