//! Domain error types for light curve acquisition.

use color_eyre::Report;
use thiserror::Error;

/// Result alias for operations that may return an [`AcquireError`].
pub type Result<T> = std::result::Result<T, AcquireError>;

/// Result alias for cache store operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Result alias for configuration fallible operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result alias for input table parsing.
pub type InputResult<T> = std::result::Result<T, InputError>;

/// Result alias for batch-level failures.
pub type BatchResult<T> = std::result::Result<T, BatchError>;

/// Result alias for remote fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Top-level error exposed by the crate.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Indicates configuration parsing failed.
    #[error("configuration parsing failed")]
    Config(#[from] ConfigError),
    /// Indicates a cache store operation failed.
    #[error("cache operation failed")]
    Cache(#[from] CacheError),
    /// Indicates the ID table could not be read.
    #[error("input parsing failed")]
    Input(#[from] InputError),
    /// Indicates a batch could not be started or reported.
    #[error("batch run failed")]
    Batch(#[from] BatchError),
    /// Indicates a single light curve could not be resolved.
    #[error("light curve resolution failed")]
    Fetch(#[from] FetchError),
}

/// Classifies fetch failures so the retry loop can branch on structure
/// instead of message text.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// The archive holds no candidate for the requested ID.
    NotFound,
    /// Corruption, interruption or I/O failure that may succeed on retry.
    Transient,
    /// Any other failure; never retried.
    #[default]
    Other,
}

impl FetchErrorKind {
    /// Returns `true` when another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Failure reported by a remote resolver or by the local commit step.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
#[error("{message}")]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
}

/// Reason recorded when the archive has no light curve for an ID.
pub const NOT_FOUND_REASON: &str = "No light curve found";

impl FetchError {
    /// Constructs an error with an explicit classification.
    #[must_use]
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The archive returned zero candidates.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(FetchErrorKind::NotFound, NOT_FOUND_REASON)
    }

    /// A failure worth retrying.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Transient, message)
    }

    /// A failure that retrying cannot fix.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Other, message)
    }

    /// Returns the classification of this failure.
    #[must_use]
    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    /// Returns the human-readable reason.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classifies a local I/O failure.
    ///
    /// Every local I/O failure counts as transient, including truncated or
    /// invalid data which signals a corrupted intermediate file.
    #[must_use]
    pub fn from_io(context: &str, err: &std::io::Error) -> Self {
        Self::transient(format!("{context}: {err}"))
    }
}

impl From<CacheError> for FetchError {
    fn from(err: CacheError) -> Self {
        Self::transient(format!("{:#}", err.0))
    }
}

/// Captures cache store failures.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct CacheError(#[from] Report);

/// Captures configuration failures.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ConfigError(#[from] Report);

/// Captures ID table parsing failures.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct InputError(#[from] Report);

/// Captures failures that stop a batch as a whole, such as an uncreatable
/// output directory. Per-item failures never surface here.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct BatchError(#[from] Report);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FetchErrorKind::Transient, true)]
    #[case(FetchErrorKind::NotFound, false)]
    #[case(FetchErrorKind::Other, false)]
    fn only_transient_failures_are_retryable(#[case] kind: FetchErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }

    #[test]
    fn not_found_uses_fixed_reason() {
        let err = FetchError::not_found();
        assert_eq!(err.kind(), FetchErrorKind::NotFound);
        assert_eq!(err.to_string(), NOT_FOUND_REASON);
    }

    #[test]
    fn io_errors_are_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::Interrupted, "interrupted");
        let err = FetchError::from_io("write payload", &io);
        assert!(err.kind().is_retryable());
        assert!(err.message().starts_with("write payload"));
    }
}
