//! # CardProof
//!
//! The unified API for CardProof: signed bindings between an identity and a
//! piece of content, strengthened over time by independent witnesses.
//!
//! ## Overview
//!
//! CardProof provides:
//!
//! - **Proofs**: An owner's Ed25519 signature over canonicalized content
//! - **Identifiers**: Multihash names derived from the signed document
//! - **Anchors**: External timestamp or ledger witnesses, driven by a worker
//! - **Cosignatures**: Replay-protected attestations from other identities
//! - **Tiers**: L1 through L4 grades computed offline by any verifier
//!
//! ## Key Concepts
//!
//! - **Proof**: Immutable once signed. Witnesses are appended, never edited.
//! - **Identifier**: Content-derived. Re-signing yields a new one.
//! - **Anchor job**: `QUEUED → POSTED → CONFIRMED | FAILED`, one per proof.
//! - **Cosignature**: At most one per (proof, cosigner).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cardproof::{ProofService, ServiceConfig};
//! use cardproof::core::{CanonMode, Keypair, ProofBuilder};
//! use cardproof::store::SqliteStore;
//!
//! async fn example() {
//!     // Open storage and start the service
//!     let store = SqliteStore::open("cardproof.db").unwrap();
//!     let service = ProofService::new(store, ServiceConfig::from_env());
//!     service.resume_anchors().await.unwrap();
//!
//!     // Sign content client-side
//!     let keypair = Keypair::generate();
//!     let signed = ProofBuilder::new(
//!         "https://example.com/hello.txt",
//!         "hello world",
//!         "text/plain",
//!         CanonMode::Bytes,
//!         "did:cc:alice",
//!     )
//!     .sign(&keypair)
//!     .unwrap();
//!
//!     // Publish, anchor, verify
//!     service.publish_signed(&signed).await.unwrap();
//!     service
//!         .request_anchor(&signed.id, None, "did:cc:alice")
//!         .await
//!         .unwrap();
//!     let report = service
//!         .verify(&signed.id, Some("hello world".into()))
//!         .await
//!         .unwrap();
//!     assert!(report.valid);
//!
//!     service.drain().await;
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `cardproof::core` - Core primitives (ProofDocument, ContentId, Tier, etc.)
//! - `cardproof::store` - Storage abstraction and SQLite
//! - `cardproof::anchor` - Anchor providers and worker

pub mod config;
pub mod directory;
pub mod embed;
pub mod error;
pub mod service;

// Re-export component crates
pub use cardproof_anchor as anchor;
pub use cardproof_core as core;
pub use cardproof_store as store;

// Re-export main types for convenience
pub use config::ServiceConfig;
pub use directory::{ContentFetcher, KeyDirectory, StaticContentFetcher, StaticKeyDirectory};
pub use embed::{embed_html, embed_svg, proof_url_from_html, proof_url_from_link_header};
pub use error::{Result, ServiceError};
pub use service::{AnchorTicket, CosignOutcome, CosignRequest, ProofService, ServiceBuilder};

// Re-export commonly used types
pub use cardproof_anchor::{AnchorEvent, AnchorProvider, ProviderRegistry};
pub use cardproof_core::{
    AnchorJob, AnchorState, CanonMode, Content, ContentId, Keypair, ProofBuilder, ProofDocument,
    PublicKey, SignedProof, Tier, VerifyReport,
};
