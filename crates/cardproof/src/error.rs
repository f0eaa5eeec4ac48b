//! Error types for the proof service.

use std::time::Duration;

use cardproof_anchor::AnchorError;
use cardproof_core::{ContentId, CoreError, CosignRejection};
use cardproof_store::StoreError;
use thiserror::Error;

/// Errors that can occur during service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Building or decoding a proof failed.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Anchoring error.
    #[error("anchor error: {0}")]
    Anchor(#[from] AnchorError),

    /// Proof not found.
    #[error("proof not found: {0}")]
    ProofNotFound(ContentId),

    /// The identifier does not match the document it was published with.
    #[error("identifier mismatch: document hashes to {derived}, published as {given}")]
    IdentifierMismatch { derived: ContentId, given: ContentId },

    /// The document's owner signature does not verify.
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The caller does not own the proof.
    #[error("{caller} is not the owner of {proof_id}")]
    NotOwner { proof_id: ContentId, caller: String },

    /// The owner has used up today's anchors.
    #[error("anchor quota of {limit} per day exceeded, retry in {}s", retry_after.as_secs())]
    QuotaExceeded { limit: u32, retry_after: Duration },

    /// No key could be found for the cosigner.
    #[error("could not resolve key for {cosigner}: {reason}")]
    DidResolveFailed { cosigner: String, reason: String },

    /// The cosigner already cosigned this proof.
    #[error("{cosigner} already cosigned {proof_id}")]
    AlreadyCosigned { proof_id: ContentId, cosigner: String },

    /// A cosign request was refused.
    #[error("cosign rejected: {0}")]
    Cosign(#[from] CosignRejection),

    /// Content could not be fetched for verification.
    #[error("could not fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
}

impl ServiceError {
    /// Stable machine-readable code, for callers mapping errors onto a wire
    /// response.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Core(_) => "invalid_input",
            ServiceError::Store(_) => "storage_error",
            ServiceError::Anchor(AnchorError::UnknownProvider(_)) => "unknown_provider",
            ServiceError::Anchor(_) => "anchor_error",
            ServiceError::ProofNotFound(_) => "proof_not_found",
            ServiceError::IdentifierMismatch { .. } => "identifier_mismatch",
            ServiceError::InvalidProof(_) => "invalid_proof",
            ServiceError::NotOwner { .. } => "not_owner",
            ServiceError::QuotaExceeded { .. } => "quota_exceeded",
            ServiceError::DidResolveFailed { .. } => "did_resolve_failed",
            ServiceError::AlreadyCosigned { .. } => "already_cosigned",
            ServiceError::Cosign(CosignRejection::StaleOrFutureTimestamp) => "stale_or_future_timestamp",
            ServiceError::Cosign(CosignRejection::BadSignature) => "bad_signature",
            ServiceError::Cosign(CosignRejection::NotAuthorizedCosigner) => "not_authorized_cosigner",
            ServiceError::Cosign(CosignRejection::MalformedKey(_)) => "malformed_key",
            ServiceError::Fetch { .. } => "fetch_failed",
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
