//! SHA-256 key derivation for path lookups.

use sha2::{Digest, Sha256};

/// Hash raw bytes and return a lowercase hex string.
pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Derive the primary lookup key for a path.
///
/// The path is hashed as its raw bytes exactly as given (UTF-8 for string
/// paths); no normalization is applied, so `/a/b` and `/a/b/` map to
/// different keys.
pub(crate) fn derive_key(path: impl AsRef<[u8]>) -> String {
    let bytes = path.as_ref();
    let key = sha256_hex(bytes);
    tracing::debug!(path = %String::from_utf8_lossy(bytes), key = %key, "derived lookup key");
    key
}
