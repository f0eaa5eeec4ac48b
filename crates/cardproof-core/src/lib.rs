//! # CardProof Core
//!
//! Pure primitives for CardProof: canonicalization, proof documents, signing,
//! verification, conformance tiers and cosign checks.
//!
//! This crate contains no I/O, no storage, no networking. Apart from reading
//! the clock when a signing time is not supplied, every function is pure.
//!
//! ## Key Types
//!
//! - [`ProofDocument`] - An owner's signed claim over a piece of content
//! - [`ContentId`] - Multihash identifier of a signed document
//! - [`ProofBuilder`] - Canonicalizes, hashes and signs content
//! - [`Tier`] - Conformance grade L1 through L4
//! - [`AnchorJob`] - Progress of a proof through an anchoring provider
//!
//! ## Canonicalization
//!
//! Content is normalized before hashing. See [`canonical`] module.

pub mod anchor;
pub mod canonical;
pub mod cosign;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod proof;
pub mod tier;
pub mod time;
pub mod types;
pub mod verify;

pub use anchor::{AnchorJob, AnchorState};
pub use canonical::{canonicalize, canonicalize_with, CanonMode, Content, HtmlPolicy};
pub use cosign::{cosign_message, sign_cosignature, CosignPolicy};
pub use crypto::{Keypair, PublicKey, Sha256Digest, Signature};
pub use error::{CanonError, CoreError, CosignRejection, VerifyFailure};
pub use proof::{
    Anchor, Authorship, Claim, Cosignature, ProofBuilder, ProofDocument, Resource, SignatureAlg,
    SignatureBlock, SignedProof, Visibility,
};
pub use tier::{Tier, TierEvidence};
pub use types::ContentId;
pub use verify::{verify_proof, verify_proof_with, VerifyReport};
