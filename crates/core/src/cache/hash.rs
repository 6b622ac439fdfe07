//! SHA-256 digests for cache keys and content fingerprints.

use sha2::{Digest, Sha256};

/// Hash a sequence of fields with a newline separator between them.
pub fn digest_fields<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Fingerprint of extracted text for duplicate detection.
///
/// Text is lowercased and whitespace runs collapsed before hashing, so
/// copies that differ only in layout or case share a fingerprint.
pub fn content_fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    for (i, word) in text.split_whitespace().enumerate() {
        if i > 0 {
            hasher.update(b" ");
        }
        hasher.update(word.to_lowercase().as_bytes());
    }
    hex::encode(hasher.finalize())
}
