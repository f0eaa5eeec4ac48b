//! Shared test support for the CardProof crates.
//!
//! [`vectors`] pins the byte-exact outputs every implementation must agree
//! on. [`fixtures`] hands out deterministic identities (`alice`, `bob`,
//! `carol`) that can sign proofs and cosign them. [`generators`] holds the
//! proptest strategies, and [`provider`] a [`ScriptedProvider`] whose poll
//! results are decided up front.
//!
//! ```rust
//! use cardproof_testkit::fixtures::{bob, TestFixture};
//! use cardproof_testkit::vectors::{all_vectors, sign_vector};
//!
//! let golden = sign_vector(&all_vectors()[0]);
//! assert_eq!(golden.id.to_string(), all_vectors()[0].expected_id);
//!
//! let fixture = TestFixture::new();
//! let proof = fixture.sign_with_authors("https://example.com/a", "text", &[&bob()]);
//! let parts = bob().cosign(&proof.id, "did:cc:alice");
//! # let _ = parts;
//! ```

pub mod fixtures;
pub mod generators;
pub mod provider;
pub mod vectors;

pub use fixtures::{alice, bob, carol, multi_party_identities, CosignParts, Identity, TestFixture};
pub use generators::{equivalent_html, proof_from_params, ProofParams};
pub use provider::ScriptedProvider;
pub use vectors::{all_vectors, sign_vector, verify_all_vectors, GoldenVector};
