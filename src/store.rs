use std::path::Path;

use crate::TxnLabError;

/// Thin facade over the underlying key-value store.
///
/// The store is safe for concurrent operations on independent keys and the
/// adapter adds no locking of its own: transaction atomicity comes from the
/// protocol layer (validation or locking), never from here. Committing
/// transactions apply their write buffers through `put` one key at a time.
///
/// Failures on individual operations are logged and mapped to the neutral
/// outcome (`None` / `false`); callers cannot distinguish a missing key from
/// a failed read through this interface.
#[derive(Debug, Clone)]
pub struct Store {
    db: sled::Db,
}

impl Store {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TxnLabError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.db.get(key) {
            Ok(Some(raw)) => match String::from_utf8(raw.to_vec()) {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("get {key}: value is not valid utf-8");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("get {key} failed: {e}");
                None
            }
        }
    }

    pub fn put(&self, key: &str, value: &str) -> bool {
        match self.db.insert(key, value.as_bytes()) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("put {key} failed: {e}");
                false
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        match self.db.remove(key) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("delete {key} failed: {e}");
                false
            }
        }
    }

    /// Seed the store with preset key-value pairs before a workload runs.
    pub fn initialize_with_data<I, K, V>(&self, pairs: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            if !self.put(key.as_ref(), value.as_ref()) {
                return false;
            }
        }
        true
    }

    /// Total number of keys currently stored.
    pub fn key_count(&self) -> usize {
        self.db.len()
    }

    /// Remove every key. Destructive.
    pub fn clear(&self) -> bool {
        match self.db.clear() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("clear failed: {e}");
                false
            }
        }
    }
}
