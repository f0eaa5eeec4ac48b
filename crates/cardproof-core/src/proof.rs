//! Proof: a signed binding between an identity and a piece of content.
//!
//! A proof is created once by its owner. After publication the only permitted
//! mutation is appending a witness (an anchor or a cosignature); neither is
//! covered by the owner's signature nor by the content identifier.
//!
//! **CRITICAL**: the field order of [`Resource`], [`Claim`] and the top-level
//! document is part of the signed message. Do not reorder fields.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::{canonicalize_with, CanonMode, Content, HtmlPolicy};
use crate::crypto::{Keypair, PublicKey, Sha256Digest, Signature};
use crate::error::CoreError;
use crate::time::{now_millis, rfc3339_millis, rfc3339_millis_option};
use crate::types::ContentId;

/// Document type tag.
pub const PROOF_TYPE: &str = "cc-proof";

/// Document schema version.
pub const PROOF_VERSION: &str = "1";

/// How the owner relates to the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authorship {
    #[default]
    Mine,
    Collab,
    Remix,
    Inspired,
}

/// Who may discover the proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
}

/// Signature algorithm tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignatureAlg {
    #[default]
    Ed25519,
}

impl fmt::Display for SignatureAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519 => f.write_str("Ed25519"),
        }
    }
}

/// The content a proof is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Where the content lives.
    pub url: String,
    /// `sha256-<base64>` of the canonicalized content.
    pub hash: String,
    /// MIME type as declared by the owner.
    pub content_type: String,
    /// Canonicalization applied before hashing.
    pub canonicalization: CanonMode,
}

/// What the owner asserts about the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Identity of the owner (e.g. `did:cc:alice`).
    pub owner: String,
    /// Credited authors. Cosigners are drawn from this list.
    pub authors: Vec<String>,
    pub authorship: Authorship,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    pub visibility: Visibility,
}

impl Claim {
    /// Whether `identity` is one of the credited authors.
    pub fn is_author(&self, identity: &str) -> bool {
        self.authors.iter().any(|a| a == identity)
    }
}

/// The owner's signature over the unsigned body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    pub alg: SignatureAlg,
    /// Standard base64 of the 32-byte Ed25519 key.
    pub public_key: String,
    /// Standard base64 of the 64-byte signature.
    pub signature: String,
    #[serde(with = "rfc3339_millis")]
    pub signed_at: DateTime<Utc>,
}

impl SignatureBlock {
    /// Decode the embedded public key.
    pub fn decode_public_key(&self) -> Result<PublicKey, CoreError> {
        PublicKey::from_base64(&self.public_key)
    }

    /// Decode the embedded signature.
    pub fn decode_signature(&self) -> Result<Signature, CoreError> {
        Signature::from_base64(&self.signature)
    }
}

/// A witness recorded by an anchoring provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Anchor {
    /// Provider that produced the anchor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rfc3339_millis_option"
    )]
    pub at: Option<DateTime<Utc>>,
}

impl Anchor {
    /// Whether both entries record the same provider transaction.
    ///
    /// Entries without a txid never match.
    pub fn same_witness(&self, other: &Anchor) -> bool {
        self.txid.is_some() && self.chain == other.chain && self.txid == other.txid
    }
}

/// A second identity's signature over the proof identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cosignature {
    pub cosigner: String,
    pub alg: SignatureAlg,
    /// base64url signature over the cosign message.
    pub signature: String,
    /// Multibase (`z...`) key the signature was checked against.
    pub public_key: String,
    /// Verbatim timestamp the cosigner signed.
    pub issued_at: String,
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
}

/// A complete proof document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofDocument {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub version: String,
    pub resource: Resource,
    pub claim: Claim,
    pub signature: SignatureBlock,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<Anchor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cosignatures: Vec<Cosignature>,
}

#[derive(Serialize)]
struct UnsignedBody<'a> {
    #[serde(rename = "type")]
    proof_type: &'a str,
    version: &'a str,
    resource: &'a Resource,
    claim: &'a Claim,
}

#[derive(Serialize)]
struct SignedBody<'a> {
    #[serde(rename = "type")]
    proof_type: &'a str,
    version: &'a str,
    resource: &'a Resource,
    claim: &'a Claim,
    signature: &'a SignatureBlock,
}

fn unsigned_body_bytes(resource: &Resource, claim: &Claim) -> Result<Vec<u8>, CoreError> {
    let body = UnsignedBody {
        proof_type: PROOF_TYPE,
        version: PROOF_VERSION,
        resource,
        claim,
    };
    Ok(serde_json::to_vec(&body)?)
}

impl ProofDocument {
    /// The bytes the owner's signature covers.
    ///
    /// Always uses the fixed type and version tags, so a document whose tags
    /// were altered no longer verifies.
    pub fn unsigned_bytes(&self) -> Result<Vec<u8>, CoreError> {
        unsigned_body_bytes(&self.resource, &self.claim)
    }

    /// The serialization the content identifier is computed over.
    pub fn signed_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let body = SignedBody {
            proof_type: &self.proof_type,
            version: &self.version,
            resource: &self.resource,
            claim: &self.claim,
            signature: &self.signature,
        };
        Ok(serde_json::to_vec(&body)?)
    }

    /// Compute this document's content identifier.
    pub fn content_id(&self) -> Result<ContentId, CoreError> {
        Ok(ContentId::from_serialized(&self.signed_bytes()?))
    }

    /// Owner identity from the claim.
    pub fn owner(&self) -> &str {
        &self.claim.owner
    }

    /// Parse a document from its JSON serialization.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize the full document, witnesses included.
    pub fn to_json(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl ContentId {
    /// Identifier of a proof document.
    pub fn of(doc: &ProofDocument) -> Result<Self, CoreError> {
        doc.content_id()
    }
}

/// A freshly signed proof and its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedProof {
    pub document: ProofDocument,
    pub id: ContentId,
}

/// Builder for signing proofs.
pub struct ProofBuilder {
    url: String,
    content: Content,
    content_type: String,
    mode: CanonMode,
    owner: String,
    authors: Option<Vec<String>>,
    authorship: Authorship,
    license: Option<String>,
    visibility: Visibility,
    signed_at: Option<DateTime<Utc>>,
    html_policy: HtmlPolicy,
}

impl ProofBuilder {
    /// Start building a proof.
    pub fn new(
        url: impl Into<String>,
        content: impl Into<Content>,
        content_type: impl Into<String>,
        mode: CanonMode,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
            content_type: content_type.into(),
            mode,
            owner: owner.into(),
            authors: None,
            authorship: Authorship::default(),
            license: None,
            visibility: Visibility::default(),
            signed_at: None,
            html_policy: HtmlPolicy::default(),
        }
    }

    /// Set the credited authors. Defaults to the owner alone.
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = Some(authors.into_iter().map(Into::into).collect());
        self
    }

    pub fn authorship(mut self, authorship: Authorship) -> Self {
        self.authorship = authorship;
        self
    }

    pub fn license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Fix the signing time. Sub-millisecond precision is dropped.
    pub fn signed_at(mut self, at: DateTime<Utc>) -> Self {
        self.signed_at = Some(at.trunc_subsecs(3));
        self
    }

    /// Override the attribute policy used for `cc-html-1`.
    pub fn html_policy(mut self, policy: HtmlPolicy) -> Self {
        self.html_policy = policy;
        self
    }

    /// Canonicalize, hash and sign.
    pub fn sign(self, keypair: &Keypair) -> Result<SignedProof, CoreError> {
        let canonical = canonicalize_with(&self.content, self.mode, &self.html_policy)?;
        let digest = Sha256Digest::compute(&canonical);

        let resource = Resource {
            url: self.url,
            hash: digest.to_prefixed(),
            content_type: self.content_type,
            canonicalization: self.mode,
        };
        let claim = Claim {
            authors: self.authors.unwrap_or_else(|| vec![self.owner.clone()]),
            owner: self.owner,
            authorship: self.authorship,
            license: self.license,
            visibility: self.visibility,
        };

        let message = unsigned_body_bytes(&resource, &claim)?;
        let signature = keypair.sign(&message);

        let document = ProofDocument {
            proof_type: PROOF_TYPE.to_string(),
            version: PROOF_VERSION.to_string(),
            resource,
            claim,
            signature: SignatureBlock {
                alg: SignatureAlg::Ed25519,
                public_key: keypair.public_key().to_base64(),
                signature: signature.to_base64(),
                signed_at: self.signed_at.unwrap_or_else(now_millis),
            },
            anchors: Vec::new(),
            cosignatures: Vec::new(),
        };
        let id = document.content_id()?;

        Ok(SignedProof { document, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_rfc3339;

    const UNSIGNED: &str = r#"{"type":"cc-proof","version":"1","resource":{"url":"https://example.com/hello.txt","hash":"sha256-uU0nuZNNPgilLlLX2n2r+sSE7+N6U4DukIj3rOLvzek=","content_type":"text/plain","canonicalization":"cc-bytes"},"claim":{"owner":"did:cc:alice","authors":["did:cc:alice"],"authorship":"mine","visibility":"public"}}"#;

    fn hello(signed_at: &str) -> SignedProof {
        ProofBuilder::new(
            "https://example.com/hello.txt",
            "hello world",
            "text/plain",
            CanonMode::Bytes,
            "did:cc:alice",
        )
        .signed_at(parse_rfc3339(signed_at).unwrap())
        .sign(&Keypair::from_seed(&[0x42; 32]))
        .unwrap()
    }

    #[test]
    fn test_golden_vector() {
        let proof = hello("2025-01-14T12:00:00.000Z");
        let doc = &proof.document;

        assert_eq!(String::from_utf8(doc.unsigned_bytes().unwrap()).unwrap(), UNSIGNED);
        assert_eq!(doc.signature.public_key, "IVL40Zt5HSRFMkLhXy6rbLfP+ntqXtMAl5YOBpiB2xI=");
        assert_eq!(
            doc.signature.signature,
            "0k5faePHPw1lffmp+owWNR6zEWYNcdmsDdkCb3uVe4EctgjtjuIEtRVnNRSwemGBBorsyPh7gRMx0syilugaDQ=="
        );
        assert_eq!(proof.id.to_string(), "EiCYz-SeiwuWc0dRykkJmmTaBkk5HywfTnRp6VOC5uVARQ");
    }

    #[test]
    fn test_full_document_serialization() {
        let proof = hello("2025-01-14T12:00:00.000Z");
        let json = String::from_utf8(proof.document.to_json().unwrap()).unwrap();
        let expected = format!(
            "{},\"signature\":{{\"alg\":\"Ed25519\",\"public_key\":\"{}\",\"signature\":\"{}\",\"signed_at\":\"2025-01-14T12:00:00.000Z\"}}}}",
            &UNSIGNED[..UNSIGNED.len() - 1],
            proof.document.signature.public_key,
            proof.document.signature.signature,
        );
        assert_eq!(json, expected);

        let back = ProofDocument::from_json(json.as_bytes()).unwrap();
        assert_eq!(back, proof.document);
    }

    #[test]
    fn test_id_changes_with_signed_at() {
        let later = hello("2025-01-14T12:00:01.000Z");
        assert_eq!(later.id.to_string(), "EiA_jy8bNqGt47BFrMBOxqJ_ktZRmJ2pNcMpu2n0CvwIaw");
        assert_ne!(later.id, hello("2025-01-14T12:00:00.000Z").id);
    }

    #[test]
    fn test_id_ignores_witnesses() {
        let proof = hello("2025-01-14T12:00:00.000Z");
        let mut doc = proof.document.clone();
        doc.anchors.push(Anchor {
            chain: Some("none".into()),
            txid: None,
            at: Some(parse_rfc3339("2025-01-14T12:05:00Z").unwrap()),
        });
        assert_eq!(ContentId::of(&doc).unwrap(), proof.id);
    }

    #[test]
    fn test_defaults_and_optional_license() {
        let proof = ProofBuilder::new("u", "x", "text/plain", CanonMode::Bytes, "did:cc:bob")
            .license("CC-BY-4.0")
            .authors(["did:cc:bob", "did:cc:carol"])
            .authorship(Authorship::Collab)
            .visibility(Visibility::Unlisted)
            .sign(&Keypair::generate())
            .unwrap();

        let claim = &proof.document.claim;
        assert_eq!(claim.license.as_deref(), Some("CC-BY-4.0"));
        assert!(claim.is_author("did:cc:carol"));
        assert!(!claim.is_author("did:cc:mallory"));

        let body = String::from_utf8(proof.document.unsigned_bytes().unwrap()).unwrap();
        assert!(body.contains(r#""authorship":"collab","license":"CC-BY-4.0","visibility":"unlisted""#));
    }

    #[test]
    fn test_reserved_mode_fails_to_sign() {
        let result = ProofBuilder::new("u", "# md", "text/markdown", CanonMode::MarkdownV1, "o")
            .sign(&Keypair::generate());
        assert!(matches!(result, Err(CoreError::Canon(_))));
    }
}
