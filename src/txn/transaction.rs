use std::collections::HashMap;
use std::time::Instant;

use super::{Timestamp, TxnId};
use crate::store::Store;
use crate::TxnLabError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    Active,
    Committed,
    Aborted,
}

/// Per-transaction private state.
///
/// A transaction is owned by exactly one worker thread between `begin` and
/// `commit`/`abort`; nothing here is shared. The read set records the value
/// observed at first read of each key, the write set buffers pending writes
/// (last-write-wins). Neither is visible to other transactions until the
/// owning manager applies the write set at commit.
#[derive(Debug)]
pub struct Transaction {
    pub txn_id: TxnId,
    pub type_name: String,
    pub start_ts: Timestamp,
    pub validation_ts: Timestamp,
    pub finish_ts: Timestamp,
    pub status: TxnStatus,
    pub read_set: HashMap<String, String>,
    pub write_set: HashMap<String, String>,
    /// Keys declared at `begin` and held for the whole lifetime (C2PL only;
    /// empty under OCC).
    pub lock_keys: Vec<String>,
    pub wall_start: Instant,
    pub retry_count: u32,
}

impl Transaction {
    pub(crate) fn new(txn_id: TxnId, type_name: &str, start_ts: Timestamp) -> Self {
        Self {
            txn_id,
            type_name: type_name.to_string(),
            start_ts,
            validation_ts: 0,
            finish_ts: 0,
            status: TxnStatus::Active,
            read_set: HashMap::new(),
            write_set: HashMap::new(),
            lock_keys: Vec::new(),
            wall_start: Instant::now(),
            retry_count: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TxnStatus::Active
    }

    /// Read a key, checking the write buffer first (read-your-writes).
    ///
    /// A buffered or stored value is recorded in the read set; reading an
    /// absent key records nothing, so a key that is created concurrently is
    /// not a validation conflict for this transaction.
    pub fn read(&mut self, key: &str, store: &Store) -> Result<Option<String>, TxnLabError> {
        self.check_active("read")?;

        if let Some(buffered) = self.write_set.get(key) {
            let value = buffered.clone();
            self.read_set.insert(key.to_string(), value.clone());
            return Ok(Some(value));
        }

        let value = store.get(key);
        if let Some(ref value) = value {
            self.read_set.insert(key.to_string(), value.clone());
        }
        Ok(value)
    }

    /// Buffer a write. Never consults the store; repeated writes to the same
    /// key overwrite.
    pub fn write(&mut self, key: &str, value: &str) -> Result<(), TxnLabError> {
        self.check_active("write")?;
        self.write_set.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub(crate) fn check_active(&self, op: &str) -> Result<(), TxnLabError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(TxnLabError::InvalidTransactionState(format!(
                "{op} on {:?} transaction {}",
                self.status, self.txn_id
            )))
        }
    }
}
