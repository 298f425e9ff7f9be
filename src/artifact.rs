//! Catalog identifiers and the file names derived from them.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default file extension for light curve artifacts.
pub const DEFAULT_EXTENSION: &str = "fits";

/// Positive catalog identifier naming one light curve.
///
/// The ID is the sole key for caching and file naming; every store uses
/// `{root}/{id}.{ext}`.
///
/// # Examples
/// ```
/// use lightcurve_acquire::ArtifactId;
///
/// let id: ArtifactId = "10797460".parse()?;
/// assert_eq!(id.file_name("fits"), "10797460.fits");
/// assert!(ArtifactId::new(0).is_none());
/// # Ok::<(), lightcurve_acquire::ParseArtifactIdError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ArtifactId(NonZeroU64);

impl ArtifactId {
    /// Wraps `value`, rejecting zero.
    #[must_use]
    pub const fn new(value: u64) -> Option<Self> {
        match NonZeroU64::new(value) {
            Some(inner) => Some(Self(inner)),
            None => None,
        }
    }

    /// Returns the raw integer.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Canonical file name for this ID with the given extension.
    #[must_use]
    pub fn file_name(self, extension: &str) -> String {
        format!("{self}.{extension}")
    }

    /// Prefix shared by every in-flight temporary file for this ID.
    ///
    /// Temporary files are hidden so directory scans for `*.{ext}` never
    /// mistake them for committed artifacts.
    #[must_use]
    pub(crate) fn temp_prefix(self) -> String {
        format!(".{self}.")
    }

    /// Parses an ID back out of a canonical file name such as `123.fits`.
    ///
    /// Names that merely parse to an ID, such as `0123.fits` or `+123.fits`,
    /// are rejected: only the exact name [`Self::file_name`] produces counts.
    #[must_use]
    pub fn from_file_name(name: &str, extension: &str) -> Option<Self> {
        let stem = name.strip_suffix(extension)?.strip_suffix('.')?;
        let id: Self = stem.parse().ok()?;
        (id.file_name(extension) == name).then_some(id)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure to parse an [`ArtifactId`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid catalog id {input:?}: expected a positive integer")]
pub struct ParseArtifactIdError {
    input: String,
}

impl FromStr for ArtifactId {
    type Err = ParseArtifactIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        trimmed
            .parse::<u64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| ParseArtifactIdError {
                input: trimmed.to_owned(),
            })
    }
}

impl TryFrom<u64> for ArtifactId {
    type Error = ParseArtifactIdError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| ParseArtifactIdError {
            input: value.to_string(),
        })
    }
}

impl From<ArtifactId> for u64 {
    fn from(id: ArtifactId) -> Self {
        id.get()
    }
}
