//! Path lookup: derive the key, read the primary value and optionally the
//! file hash recorded next to it.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use crate::hashing::derive_key;
use crate::keys::{companion_keys, file_hash_key, path_set_key};
use crate::settings::LookupMode;
use crate::store::{KeyValueStore, StoreError};

/// Outcome of the secondary read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FileHash {
    /// Not requested, or skipped because the primary value was absent.
    Skipped,
    Missing,
    Found(String),
    /// Present but not valid UTF-8; raw bytes are kept for reporting.
    Undecodable(Vec<u8>),
}

/// Result of looking up a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathRecord {
    /// Display form of the path; invalid UTF-8 is replaced.
    pub(crate) path: String,
    pub(crate) key: String,
    pub(crate) data: Option<Vec<u8>>,
    pub(crate) file_hash: FileHash,
}

/// A companion key read by `inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompanionEntry {
    pub(crate) label: &'static str,
    pub(crate) key: String,
    pub(crate) value: Option<Vec<u8>>,
}

/// Paths the producer grouped under the same content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathSet {
    pub(crate) key: String,
    pub(crate) members: Vec<Vec<u8>>,
}

/// Everything `inspect` found for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Inspection {
    pub(crate) path: String,
    pub(crate) entries: Vec<CompanionEntry>,
    /// Set reached through the recorded file hash, if there is one.
    pub(crate) path_set: Option<PathSet>,
}

/// Lookup component bound to one store and one mode for the whole run.
pub(crate) struct PathLookup<S> {
    store: S,
    mode: LookupMode,
}

impl<S: KeyValueStore> PathLookup<S> {
    pub(crate) fn new(store: S, mode: LookupMode) -> Self {
        Self { store, mode }
    }

    /// Read the value under an already-derived key. Empty values count as
    /// absent.
    pub(crate) fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.store.get(key)?.filter(|value| !value.is_empty()))
    }

    /// Look up one path. Performs at most two reads, in order.
    pub(crate) fn query(&mut self, path: impl AsRef<OsStr>) -> Result<PathRecord, StoreError> {
        let path = path.as_ref();
        let display_path = path.to_string_lossy().into_owned();
        let key = derive_key(path.as_bytes());
        let data = self.get(&key)?;
        let file_hash = if data.is_some() && self.mode.includes_file_hash() {
            match self.get(&file_hash_key(&key))? {
                None => FileHash::Missing,
                Some(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => FileHash::Found(text),
                    Err(err) => {
                        tracing::warn!(path = %display_path, "file hash value is not valid UTF-8");
                        FileHash::Undecodable(err.into_bytes())
                    }
                },
            }
        } else {
            FileHash::Skipped
        };
        Ok(PathRecord {
            path: display_path,
            key,
            data,
            file_hash,
        })
    }

    /// Read every companion key the producer maintains for a path, then
    /// follow the recorded file hash to its set of paths.
    pub(crate) fn inspect(&mut self, path: impl AsRef<OsStr>) -> Result<Inspection, StoreError> {
        let path = path.as_ref();
        let key = derive_key(path.as_bytes());
        let mut entries = Vec::new();
        for (label, key) in companion_keys(&key, path.to_str()) {
            let value = self.get(&key)?;
            entries.push(CompanionEntry { label, key, value });
        }
        let file_hash = entries
            .iter()
            .find(|entry| entry.label == "file_hash")
            .and_then(|entry| entry.value.as_deref())
            .and_then(|value| std::str::from_utf8(value).ok())
            .map(str::to_string);
        let path_set = match file_hash {
            Some(file_hash) => {
                let key = path_set_key(&file_hash);
                let members = self.store.members(&key)?;
                Some(PathSet { key, members })
            }
            None => None,
        };
        Ok(Inspection {
            path: path.to_string_lossy().into_owned(),
            entries,
            path_set,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SnapshotStore;
    use std::os::unix::ffi::OsStrExt;

    const X_KEY: &str = "b3d1db318671a024a7e4b433389f8820d6ca466e2cf700afc29f37ed64f2fa0d";
    const AB_KEY: &str = "662b7b62a798bb2d53e67cad9778e12e48297c79eae98d3aae7197be825d768f";

    /// Store that counts reads, to check how many GETs a lookup issues.
    struct CountingStore {
        inner: SnapshotStore,
        reads: Vec<String>,
    }

    impl KeyValueStore for CountingStore {
        fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.reads.push(key.to_string());
            self.inner.get(key)
        }

        fn members(&mut self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
            self.reads.push(key.to_string());
            self.inner.members(key)
        }
    }

    fn counting(entries: Vec<(String, Vec<u8>)>) -> CountingStore {
        CountingStore {
            inner: entries.into_iter().collect(),
            reads: Vec::new(),
        }
    }

    fn entry(key: &str, value: &[u8]) -> (String, Vec<u8>) {
        (key.to_string(), value.to_vec())
    }

    #[test]
    fn get_returns_prepopulated_value() {
        let store: SnapshotStore = [(AB_KEY, "V")].into_iter().collect();
        let mut lookup = PathLookup::new(store, LookupMode::Primary);
        assert_eq!(lookup.get(&derive_key("/a/b")).expect("get"), Some(b"V".to_vec()));
    }

    #[test]
    fn empty_store_yields_absent_data_and_single_read() {
        let mut lookup = PathLookup::new(counting(Vec::new()), LookupMode::WithFileHash);
        let record = lookup.query("/nonexistent").expect("query");
        assert_eq!(record.data, None);
        assert_eq!(record.file_hash, FileHash::Skipped);
        assert_eq!(lookup.store.reads.len(), 1);
    }

    #[test]
    fn primary_mode_never_reads_file_hash() {
        let mut lookup = PathLookup::new(
            counting(vec![
                entry(X_KEY, b"hello"),
                entry(&file_hash_key(X_KEY), b"abc"),
            ]),
            LookupMode::Primary,
        );
        let record = lookup.query("/x").expect("query");
        assert_eq!(record.data, Some(b"hello".to_vec()));
        assert_eq!(record.file_hash, FileHash::Skipped);
        assert_eq!(lookup.store.reads, vec![X_KEY.to_string()]);
    }

    #[test]
    fn file_hash_mode_reports_missing_secondary() {
        let mut lookup = PathLookup::new(
            counting(vec![entry(X_KEY, b"hello")]),
            LookupMode::WithFileHash,
        );
        let record = lookup.query("/x").expect("query");
        assert_eq!(record.key, X_KEY);
        assert_eq!(record.file_hash, FileHash::Missing);
        assert_eq!(
            lookup.store.reads,
            vec![X_KEY.to_string(), format!("fileHashToPathset:{X_KEY}")]
        );
    }

    #[test]
    fn file_hash_mode_decodes_secondary() {
        let secondary = file_hash_key(X_KEY);
        let mut lookup = PathLookup::new(
            counting(vec![entry(X_KEY, b"hello"), entry(&secondary, b"d41d8cd9")]),
            LookupMode::WithFileHash,
        );
        let record = lookup.query("/x").expect("query");
        assert_eq!(record.file_hash, FileHash::Found("d41d8cd9".to_string()));
    }

    #[test]
    fn undecodable_secondary_is_kept_as_bytes() {
        let secondary = file_hash_key(X_KEY);
        let mut lookup = PathLookup::new(
            counting(vec![entry(X_KEY, b"hello"), entry(&secondary, &[0xff, 0xfe])]),
            LookupMode::WithFileHash,
        );
        let record = lookup.query("/x").expect("query");
        assert_eq!(record.file_hash, FileHash::Undecodable(vec![0xff, 0xfe]));
    }

    #[test]
    fn empty_primary_value_counts_as_absent() {
        let secondary = file_hash_key(X_KEY);
        let mut lookup = PathLookup::new(
            counting(vec![entry(X_KEY, b""), entry(&secondary, b"")]),
            LookupMode::WithFileHash,
        );
        let record = lookup.query("/x").expect("query");
        assert_eq!(record.data, None);
        assert_eq!(record.file_hash, FileHash::Skipped);
        assert_eq!(lookup.store.reads, vec![X_KEY.to_string()]);
    }

    #[test]
    fn empty_file_hash_counts_as_missing() {
        let secondary = file_hash_key(X_KEY);
        let mut lookup = PathLookup::new(
            counting(vec![entry(X_KEY, b"hello"), entry(&secondary, b"")]),
            LookupMode::WithFileHash,
        );
        let record = lookup.query("/x").expect("query");
        assert_eq!(record.file_hash, FileHash::Missing);
    }

    #[test]
    fn non_utf8_path_is_hashed_as_raw_bytes() {
        let path = OsStr::from_bytes(b"/bad\xff");
        let mut lookup = PathLookup::new(counting(Vec::new()), LookupMode::Primary);
        let record = lookup.query(path).expect("query");
        assert_eq!(
            record.key,
            "1ddc2a1ec71bdca79f3c59da2296fccfeb41699644e0beed47fe073c22a05a63"
        );
        assert_eq!(record.path, "/bad\u{fffd}");
    }

    #[test]
    fn inspect_reads_all_companion_keys() {
        let mut store = SnapshotStore::default();
        store.insert(format!("hashedKeyToPath:{X_KEY}"), "/x");
        store.insert("pathToHashedKey:/x", X_KEY);
        let mut lookup = PathLookup::new(store, LookupMode::Primary);

        let inspection = lookup.inspect("/x").expect("inspect");
        let labels: Vec<&str> = inspection.entries.iter().map(|entry| entry.label).collect();
        assert_eq!(
            labels,
            vec!["file_info", "path", "path_key", "file_hash", "full_hash", "pathset_hash"]
        );
        assert_eq!(inspection.entries[1].value, Some(b"/x".to_vec()));
        assert_eq!(inspection.entries[2].value, Some(X_KEY.as_bytes().to_vec()));
        assert!(inspection.entries[3..].iter().all(|entry| entry.value.is_none()));
        assert_eq!(inspection.path_set, None);
    }

    #[test]
    fn inspect_follows_file_hash_to_path_set() {
        let mut store = SnapshotStore::default();
        store.insert(format!("hashedKeyToFileHash:{X_KEY}"), "c0ffee");
        store.insert_member("fileHashToPathSet:c0ffee", "/y");
        store.insert_member("fileHashToPathSet:c0ffee", "/x");
        let mut lookup = PathLookup::new(store, LookupMode::Primary);

        let inspection = lookup.inspect("/x").expect("inspect");
        assert_eq!(
            inspection.path_set,
            Some(PathSet {
                key: "fileHashToPathSet:c0ffee".to_string(),
                members: vec![b"/x".to_vec(), b"/y".to_vec()],
            })
        );
    }
}
