//! Error types for the anchor module.

use thiserror::Error;

/// Errors that can occur while anchoring.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// The provider could not be reached. Transient; the worker retries.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// No provider is registered under this name.
    #[error("unknown anchor provider: {0}")]
    UnknownProvider(String),

    /// The provider rejected the request.
    #[error("provider error: {0}")]
    Provider(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] cardproof_store::StoreError),

    /// The worker is no longer accepting jobs.
    #[error("anchor worker stopped")]
    WorkerStopped,
}

impl AnchorError {
    /// Whether the worker should retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, AnchorError::ProviderUnavailable(_))
    }
}

/// Result type for anchor operations.
pub type Result<T> = std::result::Result<T, AnchorError>;
