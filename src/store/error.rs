//! Object store errors.

use thiserror::Error;

/// Failure of a single object store call.
///
/// These never reach an HTTP client directly; the virtual file system logs
/// them and treats the affected candidate as absent.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key does not exist in the bucket.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Network, authentication or service-side failure.
    #[error("object store request failed: {0}")]
    Request(String),

    /// The store answered with something we could not interpret.
    #[error("malformed object store response: {0}")]
    Malformed(String),
}

impl StoreError {
    /// True for plain "no such key" answers.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
