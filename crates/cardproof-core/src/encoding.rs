//! Text encodings used on the wire.
//!
//! - Proof documents carry keys, signatures and digests as padded standard base64.
//! - Content identifiers and cosign signatures use base64url. Decoding accepts
//!   both padded and unpadded input.
//! - Cosigner keys arrive as multibase strings (`z` = base58btc) or plain base64.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

use crate::error::CoreError;

/// base64url: unpadded on encode, padding-indifferent on decode.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Multicodec prefix for an Ed25519 public key (varint 0xed).
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Encode bytes as padded standard base64.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode padded standard base64.
pub fn from_base64(s: &str) -> Result<Vec<u8>, CoreError> {
    STANDARD
        .decode(s)
        .map_err(|e| CoreError::Decoding(format!("base64: {}", e)))
}

/// Encode bytes as unpadded base64url.
pub fn to_base64url(bytes: &[u8]) -> String {
    URL_SAFE_LENIENT.encode(bytes)
}

/// Decode base64url, with or without padding.
pub fn from_base64url(s: &str) -> Result<Vec<u8>, CoreError> {
    URL_SAFE_LENIENT
        .decode(s)
        .map_err(|e| CoreError::Decoding(format!("base64url: {}", e)))
}

/// Decode an Ed25519 public key given as multibase or plain base64.
///
/// Accepted forms:
/// - `z<base58btc>` over either the raw 32 key bytes or `0xed 0x01 || key`
/// - standard base64 of the raw 32 key bytes (the proof document format)
pub fn decode_public_key(s: &str) -> Result<[u8; 32], CoreError> {
    // A plain base64 key may itself start with 'z'.
    let multibase = s
        .strip_prefix('z')
        .and_then(|b58| bs58::decode(b58).into_vec().ok())
        .filter(|b| b.len() == 32 || b.len() == 34);
    let bytes = match multibase {
        Some(bytes) => bytes,
        None => from_base64(s)?,
    };

    let raw = match bytes.len() {
        32 => &bytes[..],
        34 if bytes[..2] == ED25519_MULTICODEC => &bytes[2..],
        n => {
            return Err(CoreError::InvalidPublicKey(format!(
                "expected 32 key bytes, got {}",
                n
            )))
        }
    };

    let mut key = [0u8; 32];
    key.copy_from_slice(raw);
    Ok(key)
}

/// Encode an Ed25519 public key as a `z` multibase string with multicodec prefix.
pub fn encode_multibase_key(key: &[u8; 32]) -> String {
    let mut prefixed = Vec::with_capacity(34);
    prefixed.extend_from_slice(&ED25519_MULTICODEC);
    prefixed.extend_from_slice(key);
    format!("z{}", bs58::encode(prefixed).into_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64url_accepts_padding() {
        let encoded = to_base64url(b"ab");
        assert_eq!(encoded, "YWI");
        assert_eq!(from_base64url("YWI").unwrap(), b"ab");
        assert_eq!(from_base64url("YWI=").unwrap(), b"ab");
    }

    #[test]
    fn test_public_key_forms() {
        let key = [7u8; 32];

        let multibase = encode_multibase_key(&key);
        assert!(multibase.starts_with('z'));
        assert_eq!(decode_public_key(&multibase).unwrap(), key);

        let bare = format!("z{}", bs58::encode(key).into_string());
        assert_eq!(decode_public_key(&bare).unwrap(), key);

        assert_eq!(decode_public_key(&to_base64(&key)).unwrap(), key);
    }

    #[test]
    fn test_public_key_wrong_length() {
        let short = to_base64(&[1u8; 31]);
        assert!(matches!(
            decode_public_key(&short),
            Err(CoreError::InvalidPublicKey(_))
        ));
    }
}
