//! Store key naming shared with the external producer.
//!
//! Only the primary key and the file hash key are read by `lookup`. The other
//! prefixes are written by the indexer that populates the store and are read
//! back by `inspect`.

/// Prefix of the key holding the file hash recorded for a path.
pub(crate) const FILE_HASH_PREFIX: &str = "fileHashToPathset:";
/// Prefix of the producer's encoded file record.
pub(crate) const FILE_INFO_PREFIX: &str = "fileInfo:";
/// Prefix of the key mapping a derived key back to its original path.
pub(crate) const HASHED_KEY_TO_PATH_PREFIX: &str = "hashedKeyToPath:";
/// Prefix of the key mapping an original path to its derived key.
pub(crate) const PATH_TO_HASHED_KEY_PREFIX: &str = "pathToHashedKey:";
/// Prefix of the key holding the partial content hash of the file.
pub(crate) const HASHED_KEY_TO_FILE_HASH_PREFIX: &str = "hashedKeyToFileHash:";
/// Prefix of the key holding the full content hash of the file.
pub(crate) const HASHED_KEY_TO_FULL_HASH_PREFIX: &str = "hashedKeyToFullHash:";
/// Prefix of the set of paths sharing one content hash. Note the capital `S`,
/// unlike [`FILE_HASH_PREFIX`].
pub(crate) const FILE_HASH_TO_PATH_SET_PREFIX: &str = "fileHashToPathSet:";

/// Secondary key for a derived primary key.
pub(crate) fn file_hash_key(key: &str) -> String {
    format!("{FILE_HASH_PREFIX}{key}")
}

/// Key of the set of paths whose content hashes to `file_hash`.
pub(crate) fn path_set_key(file_hash: &str) -> String {
    format!("{FILE_HASH_TO_PATH_SET_PREFIX}{file_hash}")
}

/// Companion keys the producer maintains for a derived key, with labels.
///
/// The reverse mapping is keyed by the path text, so it is only listed when
/// the path is valid UTF-8.
pub(crate) fn companion_keys(key: &str, path: Option<&str>) -> Vec<(&'static str, String)> {
    let mut keys = vec![("file_info", format!("{FILE_INFO_PREFIX}{key}"))];
    keys.push(("path", format!("{HASHED_KEY_TO_PATH_PREFIX}{key}")));
    if let Some(path) = path {
        keys.push(("path_key", format!("{PATH_TO_HASHED_KEY_PREFIX}{path}")));
    }
    keys.push(("file_hash", format!("{HASHED_KEY_TO_FILE_HASH_PREFIX}{key}")));
    keys.push(("full_hash", format!("{HASHED_KEY_TO_FULL_HASH_PREFIX}{key}")));
    keys.push(("pathset_hash", file_hash_key(key)));
    keys
}
