//! Keyed cryptographic hashing for anonymization.
//!
//! Uses HMAC-SHA256 with truncated hex output to provide stable,
//! non-reversible pseudonyms that stay comparable across fetches.

use crate::error::{RedactionError, Result};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// Default number of bytes to keep from HMAC output (32 hex chars).
pub const DEFAULT_TRUNCATION_BYTES: usize = 16;

/// Key material for HMAC-SHA256.
#[derive(Clone)]
pub struct KeyMaterial {
    /// The raw key bytes (32 bytes for HMAC-SHA256).
    key: [u8; 32],
}

impl KeyMaterial {
    /// Create key material from raw bytes.
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive key material from a project salt.
    ///
    /// The salt is stretched through SHA-256 so any length of salt string
    /// yields a full-width HMAC key.
    pub fn derive_from_salt(salt: &str) -> Self {
        let digest = Sha256::digest(salt.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Create key material from a hex-encoded 32-byte string.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let decoded = hex::decode(encoded)
            .map_err(|e| RedactionError::KeyError(format!("invalid hex: {}", e)))?;

        if decoded.len() != 32 {
            return Err(RedactionError::KeyError(format!(
                "key must be 32 bytes, got {}",
                decoded.len()
            )));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&decoded);
        Ok(Self { key })
    }

    /// Compute HMAC-SHA256 of the input and return truncated hex output.
    pub fn hash(&self, input: &str, truncation_bytes: usize) -> String {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(input.as_bytes());
        let result = mac.finalize().into_bytes();

        // Truncate to specified bytes (clamped to valid range)
        let trunc = truncation_bytes.clamp(4, 32);
        hex::encode(&result[..trunc])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let key = KeyMaterial::from_bytes([0u8; 32]);
        let hash1 = key.hash("hello world", 16);
        let hash2 = key.hash("hello world", 16);
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_length() {
        let key = KeyMaterial::from_bytes([0u8; 32]);
        // 16 bytes = 32 hex chars
        assert_eq!(key.hash("test", 16).len(), 32);
        // Truncation clamps to at least 4 bytes
        assert_eq!(key.hash("test", 0).len(), 8);
    }

    #[test]
    fn test_different_keys_different_hashes() {
        let key1 = KeyMaterial::from_bytes([0u8; 32]);
        let key2 = KeyMaterial::from_bytes([1u8; 32]);
        assert_ne!(key1.hash("test", 16), key2.hash("test", 16));
    }

    #[test]
    fn test_salt_derivation_is_stable() {
        let key1 = KeyMaterial::derive_from_salt("salt-a");
        let key2 = KeyMaterial::derive_from_salt("salt-a");
        let key3 = KeyMaterial::derive_from_salt("salt-b");
        assert_eq!(key1.hash("x", 16), key2.hash("x", 16));
        assert_ne!(key1.hash("x", 16), key3.hash("x", 16));
    }

    #[test]
    fn test_from_hex_roundtrip() {
        let key = KeyMaterial::from_hex(&"ab".repeat(32)).unwrap();
        assert_eq!(key.hash("x", 16), key.hash("x", 16));
        assert!(KeyMaterial::from_hex("zz").is_err());
        assert!(KeyMaterial::from_hex("abcd").is_err());
    }
}
