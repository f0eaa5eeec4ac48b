//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use cardproof_core::cosign::sign_cosignature;
use cardproof_core::encoding::encode_multibase_key;
use cardproof_core::time::{format_millis, now_millis, parse_rfc3339};
use cardproof_core::{CanonMode, ContentId, Keypair, ProofBuilder, PublicKey, SignedProof};
use cardproof_store::{MemoryStore, Store};
use chrono::{DateTime, Utc};

/// Signing time used by fixtures unless a test overrides it.
pub const FIXED_SIGNED_AT: &str = "2025-01-14T12:00:00.000Z";

/// A named identity with a deterministic keypair.
#[derive(Debug)]
pub struct Identity {
    pub did: String,
    pub keypair: Keypair,
}

impl Identity {
    pub fn from_seed(did: impl Into<String>, seed: [u8; 32]) -> Self {
        Self {
            did: did.into(),
            keypair: Keypair::from_seed(&seed),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// The key in multibase form, as cosign requests carry it.
    pub fn multibase_key(&self) -> String {
        encode_multibase_key(self.public_key().as_bytes())
    }

    /// Cosign a proof as of `issued_at`.
    pub fn cosign_at(&self, proof_id: &ContentId, owner: &str, issued_at: DateTime<Utc>) -> CosignParts {
        let issued_at = format_millis(&issued_at);
        CosignParts {
            cosigner: self.did.clone(),
            signature: sign_cosignature(&self.keypair, proof_id, owner, &issued_at),
            public_key: self.multibase_key(),
            issued_at,
        }
    }

    /// Cosign a proof as of now.
    pub fn cosign(&self, proof_id: &ContentId, owner: &str) -> CosignParts {
        self.cosign_at(proof_id, owner, now_millis())
    }
}

/// The fields of a cosign request, as a client would send them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosignParts {
    pub cosigner: String,
    pub issued_at: String,
    pub signature: String,
    pub public_key: String,
}

/// The golden-vector owner.
pub fn alice() -> Identity {
    Identity::from_seed("did:cc:alice", [0x42; 32])
}

pub fn bob() -> Identity {
    Identity::from_seed("did:cc:bob", [7; 32])
}

pub fn carol() -> Identity {
    Identity::from_seed("did:cc:carol", [9; 32])
}

/// A test fixture with an owner and a memory store.
pub struct TestFixture {
    pub owner: Identity,
    pub store: MemoryStore,
}

impl TestFixture {
    /// A fixture owned by [`alice`].
    pub fn new() -> Self {
        Self::with_owner(alice())
    }

    pub fn with_owner(owner: Identity) -> Self {
        Self {
            owner,
            store: MemoryStore::new(),
        }
    }

    /// Start a `cc-bytes` proof over `text`, signed at [`FIXED_SIGNED_AT`].
    pub fn builder(&self, url: &str, text: &str) -> ProofBuilder {
        let signed_at = parse_rfc3339(FIXED_SIGNED_AT).expect("fixed timestamp parses");
        ProofBuilder::new(url, text, "text/plain", CanonMode::Bytes, self.owner.did.as_str())
            .signed_at(signed_at)
    }

    /// Sign `text` as the owner.
    pub fn sign_text(&self, url: &str, text: &str) -> SignedProof {
        self.builder(url, text)
            .sign(&self.owner.keypair)
            .expect("bytes mode never fails")
    }

    /// Sign `text` crediting the owner and `coauthors`.
    pub fn sign_with_authors(&self, url: &str, text: &str, coauthors: &[&Identity]) -> SignedProof {
        let authors = std::iter::once(self.owner.did.clone())
            .chain(coauthors.iter().map(|a| a.did.clone()));
        self.builder(url, text)
            .authors(authors)
            .sign(&self.owner.keypair)
            .expect("bytes mode never fails")
    }

    /// Store a signed proof directly, bypassing publication checks.
    pub async fn store_proof(&self, proof: &SignedProof) {
        self.store
            .put_proof(&proof.id, &proof.document)
            .await
            .expect("memory store accepts proofs");
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Identities with distinct deterministic keys.
pub fn multi_party_identities(count: usize) -> Vec<Identity> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            seed[1] = 0xcc;
            Identity::from_seed(format!("did:cc:party{}", i), seed)
        })
        .collect()
}
