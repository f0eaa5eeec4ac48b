//! Ed25519 keys and signatures, and the SHA-256 digest behind resource
//! hashes and proof identifiers.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::encoding::{from_base64, to_base64};
use crate::error::CoreError;

/// Prefix carried by `resource.hash` in a proof document.
pub const HASH_PREFIX: &str = "sha256-";

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha256Digest(pub [u8; 32]);

impl Sha256Digest {
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The `sha256-<base64>` form stored in `resource.hash`.
    pub fn to_prefixed(&self) -> String {
        format!("{}{}", HASH_PREFIX, to_base64(&self.0))
    }
}

impl fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", &self.to_hex()[..12])
    }
}

/// Raw Ed25519 verifying key bytes.
///
/// Proof documents carry it as standard base64; cosign requests carry it as
/// a `z`-prefixed multibase string (see [`crate::encoding`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        to_base64(&self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, CoreError> {
        let bytes = from_base64(s)?;
        <[u8; 32]>::try_from(bytes.as_slice())
            .map(Self)
            .map_err(|_| CoreError::InvalidPublicKey(format!("{} bytes, need 32", bytes.len())))
    }

    /// Check `signature` over `message`.
    ///
    /// Bytes that do not form a curve point fail with `InvalidPublicKey`; any
    /// other mismatch is `InvalidSignature`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CoreError> {
        let key = VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CoreError::InvalidPublicKey(e.to_string()))?;
        key.verify(message, &DalekSignature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &hex::encode(self.0)[..16])
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        to_base64(&self.0)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        <[u8; 64]>::try_from(bytes)
            .map(Self)
            .map_err(|_| CoreError::Decoding(format!("{} signature bytes, need 64", bytes.len())))
    }

    pub fn from_base64(s: &str) -> Result<Self, CoreError> {
        Self::from_slice(&from_base64(s)?)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({})", &hex::encode(self.0)[..16])
    }
}

/// Signing half of an identity. `Debug` prints only the public key.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Load secret key material: a 32-byte seed, or a 64-byte
    /// `seed || public` blob whose public half must match the seed.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        if let Ok(seed) = <[u8; 32]>::try_from(bytes) {
            return Ok(Self::from_seed(&seed));
        }
        let blob = <[u8; 64]>::try_from(bytes).map_err(|_| {
            CoreError::MalformedKey(format!("{} secret key bytes, need 32 or 64", bytes.len()))
        })?;
        SigningKey::from_keypair_bytes(&blob)
            .map(|signing_key| Self { signing_key })
            .map_err(|e| CoreError::MalformedKey(e.to_string()))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}
