//! Cosigning: a second identity vouches for a published proof.
//!
//! The cosigner signs `cosign:v1|{proof_id}|{owner}|{issued_at}` with Ed25519.
//! The signature travels as base64url and the key as a multibase string.
//! `issued_at` is signed verbatim, so it is stored verbatim.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::crypto::{Keypair, PublicKey, Signature};
use crate::encoding::{decode_public_key, encode_multibase_key, from_base64url, to_base64url};
use crate::error::CosignRejection;
use crate::proof::{Claim, Cosignature};
use crate::time::parse_rfc3339;
use crate::types::ContentId;

/// Prefix of every cosign message.
pub const COSIGN_DOMAIN: &str = "cosign:v1";

/// Replay window and authorization policy for cosign requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosignPolicy {
    /// How old `issued_at` may be.
    pub max_age: Duration,
    /// How far `issued_at` may be ahead of the local clock.
    pub max_skew: Duration,
    /// Identities allowed to cosign any proof, in addition to its authors.
    pub trusted_cosigners: Vec<String>,
}

impl Default for CosignPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(10 * 60),
            max_skew: Duration::from_secs(2 * 60),
            trusted_cosigners: Vec::new(),
        }
    }
}

/// Build the message a cosigner signs.
pub fn cosign_message(proof_id: &ContentId, owner: &str, issued_at: &str) -> String {
    format!("{}|{}|{}|{}", COSIGN_DOMAIN, proof_id, owner, issued_at)
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Check `issued_at` against the replay window.
pub fn check_issued_at(
    issued_at: &str,
    now: DateTime<Utc>,
    policy: &CosignPolicy,
) -> Result<DateTime<Utc>, CosignRejection> {
    let issued = parse_rfc3339(issued_at).map_err(|_| CosignRejection::StaleOrFutureTimestamp)?;
    let age = now.signed_duration_since(issued).num_milliseconds();

    if age > millis(policy.max_age) || -age > millis(policy.max_skew) {
        return Err(CosignRejection::StaleOrFutureTimestamp);
    }
    Ok(issued)
}

/// Verify a base64url cosignature over `message`.
pub fn verify_cosignature(
    message: &str,
    signature: &str,
    public_key: &PublicKey,
) -> Result<(), CosignRejection> {
    let bytes = from_base64url(signature).map_err(|_| CosignRejection::BadSignature)?;
    let signature = Signature::from_slice(&bytes).map_err(|_| CosignRejection::BadSignature)?;
    public_key
        .verify(message.as_bytes(), &signature)
        .map_err(|_| CosignRejection::BadSignature)
}

/// Parse a cosigner key given as multibase or base64.
pub fn parse_cosigner_key(key: &str) -> Result<PublicKey, CosignRejection> {
    Ok(PublicKey::from_bytes(decode_public_key(key)?))
}

/// The cosigner must be a credited author or explicitly trusted.
pub fn authorize(claim: &Claim, cosigner: &str, policy: &CosignPolicy) -> Result<(), CosignRejection> {
    if claim.is_author(cosigner) || policy.trusted_cosigners.iter().any(|t| t == cosigner) {
        Ok(())
    } else {
        Err(CosignRejection::NotAuthorizedCosigner)
    }
}

/// Produce a cosignature as a client would: base64url over the cosign message.
pub fn sign_cosignature(
    keypair: &Keypair,
    proof_id: &ContentId,
    owner: &str,
    issued_at: &str,
) -> String {
    let message = cosign_message(proof_id, owner, issued_at);
    to_base64url(keypair.sign(message.as_bytes()).as_bytes())
}

impl Cosignature {
    /// Build an accepted cosignature entry.
    pub fn accepted(
        cosigner: impl Into<String>,
        signature: impl Into<String>,
        public_key: &PublicKey,
        issued_at: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            cosigner: cosigner.into(),
            alg: Default::default(),
            signature: signature.into(),
            public_key: encode_multibase_key(public_key.as_bytes()),
            issued_at: issued_at.into(),
            created_at,
        }
    }

    /// Re-check this entry's signature offline.
    pub fn verifies(&self, proof_id: &ContentId, owner: &str) -> bool {
        let Ok(key) = parse_cosigner_key(&self.public_key) else {
            return false;
        };
        let message = cosign_message(proof_id, owner, &self.issued_at);
        verify_cosignature(&message, &self.signature, &key).is_ok()
    }
}
