//! Error types for CardProof Core.

use thiserror::Error;

use crate::canonical::CanonMode;

/// Canonicalization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonError {
    #[error("unsupported canonicalization mode: {0}")]
    UnsupportedMode(String),

    #[error("canonicalization mode {0} is not implemented")]
    NotImplemented(CanonMode),

    #[error("canonicalization mode {0} requires text content")]
    TypeMismatch(CanonMode),

    #[error("html canonicalization failed: {0}")]
    Html(String),
}

/// Core errors that can occur while building or decoding proofs.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Canon(#[from] CanonError),

    #[error("malformed key material: {0}")]
    MalformedKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid content identifier: {0}")]
    InvalidContentId(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            CoreError::Decoding(e.to_string())
        } else {
            CoreError::Encoding(e.to_string())
        }
    }
}

/// Why a proof failed verification.
///
/// Returned as part of a report, never raised. Carries no key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    #[error("content could not be canonicalized: {0}")]
    Canonicalization(CanonError),

    #[error("content hash does not match resource.hash")]
    HashMismatch,

    #[error("owner signature verification failed")]
    BadSignature,
}

/// Why a cosignature request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CosignRejection {
    #[error("issued_at is outside the accepted window")]
    StaleOrFutureTimestamp,

    #[error("cosignature verification failed")]
    BadSignature,

    #[error("cosigner is not an author of the proof")]
    NotAuthorizedCosigner,

    #[error("malformed cosigner key: {0}")]
    MalformedKey(String),
}

impl From<CoreError> for CosignRejection {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature => CosignRejection::BadSignature,
            other => CosignRejection::MalformedKey(other.to_string()),
        }
    }
}
