//! Golden test vectors for cross-implementation verification.
//!
//! Every implementation must reproduce these digests, signatures and
//! identifiers byte for byte. The signature covers only the unsigned body,
//! so it is the same for both signing times; the identifier is not.

use cardproof_core::time::parse_rfc3339;
use cardproof_core::{CanonMode, Keypair, ProofBuilder, SignedProof};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed for deterministic key generation.
    pub seed: [u8; 32],
    pub url: &'static str,
    pub content: &'static str,
    pub content_type: &'static str,
    pub mode: CanonMode,
    pub owner: &'static str,
    pub signed_at: &'static str,
    /// SHA-256 of the canonical content (hex).
    pub expected_digest_hex: &'static str,
    pub expected_hash: &'static str,
    pub expected_public_key: &'static str,
    pub expected_signature: &'static str,
    pub expected_id: &'static str,
}

const HELLO: GoldenVector = GoldenVector {
    name: "hello world, cc-bytes",
    seed: [0x42; 32],
    url: "https://example.com/hello.txt",
    content: "hello world",
    content_type: "text/plain",
    mode: CanonMode::Bytes,
    owner: "did:cc:alice",
    signed_at: "2025-01-14T12:00:00.000Z",
    expected_digest_hex: "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
    expected_hash: "sha256-uU0nuZNNPgilLlLX2n2r+sSE7+N6U4DukIj3rOLvzek=",
    expected_public_key: "IVL40Zt5HSRFMkLhXy6rbLfP+ntqXtMAl5YOBpiB2xI=",
    expected_signature: "0k5faePHPw1lffmp+owWNR6zEWYNcdmsDdkCb3uVe4EctgjtjuIEtRVnNRSwemGBBorsyPh7gRMx0syilugaDQ==",
    expected_id: "EiCYz-SeiwuWc0dRykkJmmTaBkk5HywfTnRp6VOC5uVARQ",
};

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        HELLO,
        GoldenVector {
            name: "hello world, signed one second later",
            signed_at: "2025-01-14T12:00:01.000Z",
            expected_id: "EiA_jy8bNqGt47BFrMBOxqJ_ktZRmJ2pNcMpu2n0CvwIaw",
            ..HELLO
        },
    ]
}

/// Sign a vector's inputs.
pub fn sign_vector(vector: &GoldenVector) -> SignedProof {
    let signed_at = parse_rfc3339(vector.signed_at).expect("vector timestamp parses");
    ProofBuilder::new(
        vector.url,
        vector.content,
        vector.content_type,
        vector.mode,
        vector.owner,
    )
    .signed_at(signed_at)
    .sign(&Keypair::from_seed(&vector.seed))
    .expect("vector inputs sign")
}

/// Check every vector, returning `(name, matches, produced id)`.
///
/// Call this to verify your implementation matches the reference.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let proof = sign_vector(v);
            let sig = &proof.document.signature;
            let id = proof.id.to_string();

            let matches = proof.document.resource.hash == v.expected_hash
                && sig.public_key == v.expected_public_key
                && sig.signature == v.expected_signature
                && id == v.expected_id;

            (v.name.to_string(), matches, id)
        })
        .collect()
}
