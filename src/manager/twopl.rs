use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;

use super::{CommitResult, TransactionManager};
use crate::store::Store;
use crate::txn::{Transaction, TxnId, TxnStatus};
use crate::TxnLabError;

/// Exclusive-lock table with atomic all-or-nothing acquisition.
///
/// A single table-wide mutex covers both passes of `try_acquire_all`, so no
/// partial-lock state is ever observable and deadlock is impossible: a
/// transaction either gets its whole key set or nothing.
#[derive(Debug, Default)]
pub struct LockTable {
    // key -> holder; absent means free
    table: Mutex<HashMap<String, TxnId>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every key for `txn_id`, or none of them. Returns `false` without
    /// inserting anything if any key is already held.
    pub fn try_acquire_all(&self, txn_id: TxnId, keys: &[String]) -> bool {
        let mut table = self.table.lock();

        if keys.iter().any(|key| table.contains_key(key)) {
            return false;
        }

        for key in keys {
            table.insert(key.clone(), txn_id);
        }
        true
    }

    /// Release every key whose holder is `txn_id`. Keys held by another
    /// transaction are left untouched.
    pub fn release_all(&self, txn_id: TxnId, keys: &[String]) {
        let mut table = self.table.lock();
        for key in keys {
            if table.get(key) == Some(&txn_id) {
                table.remove(key);
            }
        }
    }

    /// Current holder of a key, if any.
    pub fn holder(&self, key: &str) -> Option<TxnId> {
        self.table.lock().get(key).copied()
    }
}

/// Conservative two-phase locking with exclusive locks only.
///
/// `begin` acquires the transaction's entire declared key set before any
/// operation executes and holds it until commit or abort, so the growing
/// phase is the whole lifetime and the shrinking phase is the release at the
/// end. Commits never fail; contention shows up only as lock-acquisition
/// retries inside `begin`.
///
/// Callers must declare a superset of every key the transaction will read or
/// write. Under-declaration is not detected in release builds and silently
/// breaks serializability; debug builds assert it.
pub struct TwoPlManager {
    store: Arc<Store>,
    locks: LockTable,
    txn_id_counter: AtomicU64,
    base_backoff_us: u64,
}

impl TwoPlManager {
    pub const DEFAULT_BASE_BACKOFF_US: u64 = 100;

    pub fn new(store: Arc<Store>) -> Self {
        Self::with_base_backoff(store, Self::DEFAULT_BASE_BACKOFF_US)
    }

    pub fn with_base_backoff(store: Arc<Store>, base_backoff_us: u64) -> Self {
        Self {
            store,
            locks: LockTable::new(),
            txn_id_counter: AtomicU64::new(0),
            base_backoff_us,
        }
    }

    pub fn lock_table(&self) -> &LockTable {
        &self.locks
    }

    #[cfg(debug_assertions)]
    fn assert_declared(&self, txn: &Transaction, key: &str) {
        debug_assert!(
            txn.lock_keys.iter().any(|k| k == key),
            "transaction {} touched undeclared key {key:?}",
            txn.txn_id
        );
    }
}

impl TransactionManager for TwoPlManager {
    fn begin(&self, type_name: &str, keys: &[String]) -> Result<Transaction, TxnLabError> {
        // An empty declaration is well-formed (locks nothing); empty or
        // repeated keys are not.
        let mut seen = HashSet::with_capacity(keys.len());
        for key in keys {
            if key.is_empty() {
                return Err(TxnLabError::MalformedKeySet("empty key".into()));
            }
            if !seen.insert(key.as_str()) {
                return Err(TxnLabError::MalformedKeySet(format!(
                    "duplicate key {key:?}"
                )));
            }
        }

        let txn_id = self.txn_id_counter.fetch_add(1, Ordering::AcqRel) + 1;
        let mut txn = Transaction::new(txn_id, type_name, 0);
        txn.lock_keys = keys.to_vec();

        // Acquire everything up front; exponential backoff plus jitter
        // breaks symmetric livelock between poaching transactions.
        let mut rng = rand::thread_rng();
        let mut retry: u32 = 0;
        while !self.locks.try_acquire_all(txn_id, &txn.lock_keys) {
            let backoff_us = self.base_backoff_us << retry.min(10);
            let jitter = rng.gen_range(0..=backoff_us / 2);
            thread::sleep(Duration::from_micros(backoff_us + jitter));
            retry += 1;
        }
        txn.retry_count = retry;
        Ok(txn)
    }

    fn read(&self, txn: &mut Transaction, key: &str) -> Result<Option<String>, TxnLabError> {
        #[cfg(debug_assertions)]
        self.assert_declared(txn, key);
        // No lock taken here: every declared key is already held.
        txn.read(key, &self.store)
    }

    fn write(&self, txn: &mut Transaction, key: &str, value: &str) -> Result<(), TxnLabError> {
        #[cfg(debug_assertions)]
        self.assert_declared(txn, key);
        txn.write(key, value)
    }

    fn commit(&self, txn: &mut Transaction) -> Result<CommitResult, TxnLabError> {
        txn.check_active("commit")?;

        for (key, value) in &txn.write_set {
            self.store.put(key, value);
        }

        txn.status = TxnStatus::Committed;

        // Shrinking phase: this release is the serialization point.
        self.locks.release_all(txn.txn_id, &txn.lock_keys);

        Ok(CommitResult {
            success: true,
            txn_id: txn.txn_id,
            retries: txn.retry_count,
        })
    }

    fn abort(&self, txn: &mut Transaction) {
        if !txn.is_active() {
            return;
        }
        txn.status = TxnStatus::Aborted;
        txn.read_set.clear();
        txn.write_set.clear();
        self.locks.release_all(txn.txn_id, &txn.lock_keys);
    }

    fn protocol_name(&self) -> &'static str {
        "2PL"
    }
}
