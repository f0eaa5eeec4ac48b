//! Offline proof verification.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. Canonicalize the content and compare its digest with `resource.hash`
//! 2. Verify the owner's signature over the unsigned body
//! 3. Grade the proof from its anchors and re-verified cosignatures
//!
//! Failures are reported in the [`VerifyReport`], never raised.

use serde::Serialize;

use crate::canonical::{canonicalize_with, Content, HtmlPolicy};
use crate::crypto::Sha256Digest;
use crate::error::VerifyFailure;
use crate::proof::{Anchor, Authorship, ProofDocument};
use crate::tier::{Tier, TierEvidence};

/// Outcome of verifying a proof against content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub valid: bool,
    pub tier: Tier,
    /// Owner from the claim, present only when the signature verified.
    pub owner: Option<String>,
    pub authorship: Option<Authorship>,
    /// Anchor entries as recorded, empty unless the signature verified.
    pub anchors: Vec<Anchor>,
    pub valid_cosignatures: usize,
    #[serde(serialize_with = "serialize_failure")]
    pub error: Option<VerifyFailure>,
}

fn serialize_failure<S: serde::Serializer>(
    failure: &Option<VerifyFailure>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match failure {
        Some(f) => s.serialize_some(&f.to_string()),
        None => s.serialize_none(),
    }
}

impl VerifyReport {
    fn failed(failure: VerifyFailure) -> Self {
        Self {
            valid: false,
            tier: Tier::L1,
            owner: None,
            authorship: None,
            anchors: Vec::new(),
            valid_cosignatures: 0,
            error: Some(failure),
        }
    }
}

/// Verify a proof document against content with the default HTML policy.
pub fn verify_proof(doc: &ProofDocument, content: &Content) -> VerifyReport {
    verify_proof_with(doc, content, &HtmlPolicy::default())
}

/// Verify a proof document against content.
pub fn verify_proof_with(
    doc: &ProofDocument,
    content: &Content,
    policy: &HtmlPolicy,
) -> VerifyReport {
    // 1. Content hash
    let canonical = match canonicalize_with(content, doc.resource.canonicalization, policy) {
        Ok(bytes) => bytes,
        Err(e) => return VerifyReport::failed(VerifyFailure::Canonicalization(e)),
    };
    if Sha256Digest::compute(&canonical).to_prefixed() != doc.resource.hash {
        return VerifyReport::failed(VerifyFailure::HashMismatch);
    }

    // 2. Owner signature
    if !owner_signature_valid(doc) {
        return VerifyReport::failed(VerifyFailure::BadSignature);
    }

    // 3. Witnesses
    let valid_cosignatures = count_valid_cosignatures(doc);
    let tier = Tier::evaluate(TierEvidence {
        signature_valid: true,
        anchors: doc.anchors.len(),
        valid_cosignatures,
    });

    VerifyReport {
        valid: true,
        tier,
        owner: Some(doc.claim.owner.clone()),
        authorship: Some(doc.claim.authorship),
        anchors: doc.anchors.clone(),
        valid_cosignatures,
        error: None,
    }
}

/// Whether the embedded key verifies the embedded signature.
///
/// Malformed key or signature encodings count as an invalid signature.
pub fn owner_signature_valid(doc: &ProofDocument) -> bool {
    let (Ok(key), Ok(signature), Ok(message)) = (
        doc.signature.decode_public_key(),
        doc.signature.decode_signature(),
        doc.unsigned_bytes(),
    ) else {
        return false;
    };
    key.verify(&message, &signature).is_ok()
}

/// Count cosignatures whose signatures re-verify against this document.
pub fn count_valid_cosignatures(doc: &ProofDocument) -> usize {
    let Ok(id) = doc.content_id() else {
        return 0;
    };
    doc.cosignatures
        .iter()
        .filter(|c| c.verifies(&id, &doc.claim.owner))
        .count()
}

/// Current tier of a document without re-checking content.
pub fn document_tier(doc: &ProofDocument) -> Tier {
    Tier::evaluate(TierEvidence {
        signature_valid: owner_signature_valid(doc),
        anchors: doc.anchors.len(),
        valid_cosignatures: count_valid_cosignatures(doc),
    })
}
