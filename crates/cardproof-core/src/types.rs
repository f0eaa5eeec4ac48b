//! Strong type definitions for CardProof.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::Sha256Digest;
use crate::encoding::{from_base64url, to_base64url};
use crate::error::CoreError;

/// Multihash code for sha2-256.
pub const SHA2_256_CODE: u8 = 0x12;

/// Digest length in bytes for sha2-256.
pub const SHA2_256_LEN: u8 = 0x20;

/// A self-describing content identifier: `code || length || digest`.
///
/// Computed over the serialized signed proof document. The textual form is
/// unpadded base64url of the 34 multihash bytes and is the public, immutable
/// key under which a proof is published.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(Sha256Digest);

impl ContentId {
    /// Build an identifier from an already computed digest.
    pub const fn from_digest(digest: Sha256Digest) -> Self {
        Self(digest)
    }

    /// Hash the given serialization and wrap it as an identifier.
    pub fn from_serialized(bytes: &[u8]) -> Self {
        Self(Sha256Digest::compute(bytes))
    }

    /// The underlying digest.
    pub const fn digest(&self) -> &Sha256Digest {
        &self.0
    }

    /// The 34 multihash bytes.
    pub fn to_multihash(&self) -> [u8; 34] {
        let mut out = [0u8; 34];
        out[0] = SHA2_256_CODE;
        out[1] = SHA2_256_LEN;
        out[2..].copy_from_slice(self.0.as_bytes());
        out
    }

    /// Parse the 34 multihash bytes.
    pub fn from_multihash(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != 2 + SHA2_256_LEN as usize {
            return Err(CoreError::InvalidContentId(format!(
                "expected 34 bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != SHA2_256_CODE {
            return Err(CoreError::InvalidContentId(format!(
                "unsupported hash code 0x{:02x}",
                bytes[0]
            )));
        }
        if bytes[1] != SHA2_256_LEN {
            return Err(CoreError::InvalidContentId(format!(
                "digest length {} does not match sha2-256",
                bytes[1]
            )));
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes[2..]);
        Ok(Self(Sha256Digest(digest)))
    }

    /// URL-safe textual form.
    pub fn encode(&self) -> String {
        to_base64url(&self.to_multihash())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.encode())
    }
}

impl FromStr for ContentId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = from_base64url(s).map_err(|e| CoreError::InvalidContentId(e.to_string()))?;
        Self::from_multihash(&bytes)
    }
}

impl TryFrom<String> for ContentId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.encode()
    }
}
