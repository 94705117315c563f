//! Read-only key-value store backends.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::settings::StoreConfig;

/// Errors raised by a store backend.
#[derive(Debug, Error)]
pub(crate) enum StoreError {
    /// The store could not be reached, or the connection broke mid-command.
    #[error("cannot reach store at {target}")]
    Connection {
        target: String,
        #[source]
        source: redis::RedisError,
    },
    /// The store answered with an error reply.
    #[error("{command} {key} failed")]
    Query {
        command: &'static str,
        key: String,
        #[source]
        source: redis::RedisError,
    },
    #[error("invalid snapshot {path}: {reason}")]
    Snapshot { path: String, reason: String },
}

/// Single-key reads against a key-value store.
pub(crate) trait KeyValueStore {
    /// Fetch the raw value stored under `key`, or `None` when it is absent.
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Fetch the members of the set stored under `key`, sorted. An absent set
    /// is empty.
    fn members(&mut self, key: &str) -> Result<Vec<Vec<u8>>, StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn members(&mut self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        (**self).members(key)
    }
}

/// Open the backend selected by the store configuration.
pub(crate) fn open_store(config: &StoreConfig) -> Result<Box<dyn KeyValueStore>, StoreError> {
    match &config.snapshot {
        Some(path) => Ok(Box::new(SnapshotStore::load(path)?)),
        None => Ok(Box::new(RedisStore::new(config)?)),
    }
}

/// Redis-backed store issuing one command per read.
///
/// The connection is opened on first use and kept for the rest of the run.
pub(crate) struct RedisStore {
    client: redis::Client,
    target: String,
    conn: Option<redis::Connection>,
}

impl RedisStore {
    pub(crate) fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = config.redis_url();
        let client = redis::Client::open(url.as_str()).map_err(|source| {
            StoreError::Connection {
                target: url.clone(),
                source,
            }
        })?;
        Ok(Self {
            client,
            target: url,
            conn: None,
        })
    }

    fn connection(&mut self) -> Result<&mut redis::Connection, StoreError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let conn = self
                    .client
                    .get_connection()
                    .map_err(|source| StoreError::Connection {
                        target: self.target.clone(),
                        source,
                    })?;
                tracing::info!(target_url = %self.target, "connected to store");
                conn
            }
        };
        Ok(self.conn.insert(conn))
    }

    fn read<T: redis::FromRedisValue>(
        &mut self,
        command: &'static str,
        key: &str,
    ) -> Result<T, StoreError> {
        let target = self.target.clone();
        let conn = self.connection()?;
        match redis::cmd(command).arg(key).query(conn) {
            Ok(value) => Ok(value),
            Err(source) if is_connection_failure(&source) => {
                self.conn = None;
                Err(StoreError::Connection { target, source })
            }
            Err(source) => Err(StoreError::Query {
                command,
                key: key.to_string(),
                source,
            }),
        }
    }
}

impl KeyValueStore for RedisStore {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value: Option<Vec<u8>> = self.read("GET", key)?;
        tracing::debug!(key, hit = value.is_some(), "store GET");
        Ok(value)
    }

    fn members(&mut self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut members: Vec<Vec<u8>> = self.read("SMEMBERS", key)?;
        members.sort();
        tracing::debug!(key, count = members.len(), "store SMEMBERS");
        Ok(members)
    }
}

fn is_connection_failure(err: &redis::RedisError) -> bool {
    err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
}

/// Snapshot file value: a plain string, or an array of set members.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotValue {
    Text(String),
    Set(Vec<String>),
}

/// In-memory store, optionally seeded from a JSON snapshot.
///
/// Snapshot files are a single JSON object mapping keys to string values or
/// to arrays of strings (sets). Strings and sets live in separate namespaces.
#[derive(Debug, Default, Clone)]
pub(crate) struct SnapshotStore {
    entries: HashMap<String, Vec<u8>>,
    sets: HashMap<String, BTreeSet<Vec<u8>>>,
}

impl SnapshotStore {
    pub(crate) fn load(path: &Path) -> Result<Self, StoreError> {
        let snapshot_error = |reason: String| StoreError::Snapshot {
            path: path.display().to_string(),
            reason,
        };
        let bytes = fs::read(path).map_err(|err| snapshot_error(err.to_string()))?;
        let raw: HashMap<String, SnapshotValue> =
            serde_json::from_slice(&bytes).map_err(|err| snapshot_error(err.to_string()))?;
        let mut store = Self::default();
        for (key, value) in raw {
            match value {
                SnapshotValue::Text(text) => {
                    store.entries.insert(key, text.into_bytes());
                }
                SnapshotValue::Set(members) => {
                    store
                        .sets
                        .insert(key, members.into_iter().map(String::into_bytes).collect());
                }
            }
        }
        tracing::info!(
            path = %path.display(),
            entries = store.entries.len(),
            sets = store.sets.len(),
            "loaded store snapshot"
        );
        Ok(store)
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    #[cfg(test)]
    pub(crate) fn insert_member(&mut self, key: impl Into<String>, member: impl Into<Vec<u8>>) {
        self.sets.entry(key.into()).or_default().insert(member.into());
    }
}

impl<K: Into<String>, V: Into<Vec<u8>>> FromIterator<(K, V)> for SnapshotStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            sets: HashMap::new(),
        }
    }
}

impl KeyValueStore for SnapshotStore {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self.entries.get(key).cloned();
        tracing::debug!(key, hit = value.is_some(), "snapshot GET");
        Ok(value)
    }

    fn members(&mut self, key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let members: Vec<Vec<u8>> = self
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        tracing::debug!(key, count = members.len(), "snapshot SMEMBERS");
        Ok(members)
    }
}
