//! The anonymization engine applied to normalized output rows.

use crate::hash::{KeyMaterial, DEFAULT_TRUNCATION_BYTES};

/// Stable pseudonym generator for author identifiers.
///
/// Pseudonyms are keyed HMAC-SHA256 hashes: the same author under the same
/// salt always maps to the same pseudonym, but nothing about the original
/// identifier is recoverable without the key.
pub struct AnonymizeEngine {
    key: KeyMaterial,
}

impl AnonymizeEngine {
    /// Build an engine from a project salt string.
    pub fn from_salt(salt: &str) -> Self {
        Self {
            key: KeyMaterial::derive_from_salt(salt),
        }
    }

    /// Build an engine from explicit key material.
    pub fn new(key: KeyMaterial) -> Self {
        Self { key }
    }

    /// Produce the pseudonym for an author identifier.
    pub fn pseudonym(&self, author_id: &str) -> String {
        self.key.hash(author_id, DEFAULT_TRUNCATION_BYTES)
    }
}
