use std::time::Duration;
use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The permission store failed or did not answer in time.
    ///
    /// Never cached and never folded into a `false` answer; callers must
    /// fail closed.
    #[error("permission store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid permission input.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),
    /// A route rule that can never be evaluated meaningfully.
    #[error("invalid rule configuration: {0}")]
    InvalidRuleConfiguration(String),
}

impl Error {
    /// Returns true when the error came from the store (failure or timeout).
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::StoreUnavailable(error)
    }
}

/// A store lookup exceeded the configured timeout.
#[derive(Debug, Error)]
#[error("store lookup timed out after {0:?}")]
pub struct StoreTimeout(pub Duration);
