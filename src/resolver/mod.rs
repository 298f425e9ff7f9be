//! Remote archive access.
//!
//! A [`RemoteResolver`] finds and downloads light curves for a catalog ID.
//! Implementations classify their failures with
//! [`FetchErrorKind`](crate::FetchErrorKind) so callers never inspect
//! message text.

mod mast;

pub use mast::{DEFAULT_ARCHIVE_URL, MastResolver, MastResolverConfig};

use serde::Serialize;

use crate::artifact::ArtifactId;
use crate::error::FetchResult;

/// One downloadable product located by [`RemoteResolver::search`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Catalog ID the product belongs to.
    pub id: ArtifactId,
    /// Archive file name of the product.
    pub product: String,
    /// Location the product is downloaded from.
    pub url: String,
}

/// Locates and fetches light curves from a remote archive.
///
/// Implementations must tolerate concurrent `search` and `download` calls
/// for different IDs. Local bookkeeping for a single ID is only mutated from
/// one caller at a time.
pub trait RemoteResolver {
    /// Lists candidate products for `id`. An empty list means the archive
    /// holds nothing for this ID.
    ///
    /// # Errors
    ///
    /// Returns a classified error when the archive cannot be queried.
    fn search(&self, id: ArtifactId) -> FetchResult<Vec<Candidate>>;

    /// Downloads the payload of `candidate` into memory.
    ///
    /// # Errors
    ///
    /// Returns a classified error when the transfer fails or the payload is
    /// corrupt.
    fn download(&self, candidate: &Candidate) -> FetchResult<Vec<u8>>;

    /// Discards any resolver-side state kept for `id`, such as partially
    /// downloaded files. Best-effort.
    ///
    /// # Errors
    ///
    /// Returns an error when local state exists but cannot be removed.
    fn invalidate_local_state(&self, id: ArtifactId) -> FetchResult<()>;
}

/// Shared handle to a resolver usable from every worker.
pub type SharedResolver = std::sync::Arc<dyn RemoteResolver + Send + Sync>;
