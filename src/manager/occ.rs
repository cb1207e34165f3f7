use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{CommitResult, TransactionManager};
use crate::store::Store;
use crate::txn::{Timestamp, Transaction, TxnId, TxnStatus};
use crate::TxnLabError;

/// Run history GC once this many commits have accumulated since the last
/// sweep.
const GC_COMMIT_INTERVAL: u64 = 1024;

/// One committed transaction, as seen by backward validation.
#[derive(Debug)]
struct CommittedTxnRecord {
    #[allow(dead_code)]
    txn_id: TxnId,
    finish_ts: Timestamp,
    write_keys: HashSet<String>,
}

/// Optimistic concurrency control with backward validation.
///
/// Transactions execute against private buffers without any locking and are
/// validated at commit under a single global mutex: a committing transaction
/// conflicts with any already-committed transaction that finished after it
/// started and wrote a key it read. Validation, write application, finish
/// timestamp assignment and the history append all happen under that one
/// mutex, so commit points form a total order compatible with the
/// timestamps.
///
/// Lock order: the validation mutex may be held while taking the history
/// mutex, never the reverse.
pub struct OccManager {
    store: Arc<Store>,
    timestamp_counter: AtomicU64,
    txn_id_counter: AtomicU64,
    validation_mutex: Mutex<()>,
    committed_history: Mutex<Vec<CommittedTxnRecord>>,
    /// Active transactions (txn_id, start_ts), maintained by begin and
    /// commit/abort. Its minimum start_ts is the GC threshold.
    active: Mutex<Vec<(TxnId, Timestamp)>>,
    commits_since_gc: AtomicU64,
}

impl OccManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            timestamp_counter: AtomicU64::new(0),
            txn_id_counter: AtomicU64::new(0),
            validation_mutex: Mutex::new(()),
            committed_history: Mutex::new(Vec::new()),
            active: Mutex::new(Vec::new()),
            commits_since_gc: AtomicU64::new(0),
        }
    }

    fn validate(&self, txn: &Transaction) -> bool {
        let history = self.committed_history.lock();
        for record in history.iter() {
            if record.finish_ts > txn.start_ts
                && record.write_keys.iter().any(|k| txn.read_set.contains_key(k))
            {
                return false;
            }
        }
        true
    }

    fn unregister_active(&self, txn_id: TxnId) {
        let mut active = self.active.lock();
        active.retain(|(id, _)| *id != txn_id);
    }

    /// Smallest start_ts among still-active transactions, or the current
    /// counter value when none are active.
    fn min_active_start_ts(&self) -> Timestamp {
        let active = self.active.lock();
        active
            .iter()
            .map(|(_, start_ts)| *start_ts)
            .min()
            .unwrap_or_else(|| self.timestamp_counter.load(Ordering::Acquire))
    }

    /// Drop committed records that can no longer conflict with any active
    /// transaction (`finish_ts <= min_active_start_ts`). Safe to call at any
    /// time, including concurrently with commits, and safe to never call.
    pub fn garbage_collect(&self, min_active_start_ts: Timestamp) {
        let mut history = self.committed_history.lock();
        history.retain(|record| record.finish_ts > min_active_start_ts);
    }

    /// Number of retained committed-transaction records.
    pub fn committed_history_len(&self) -> usize {
        self.committed_history.lock().len()
    }
}

impl TransactionManager for OccManager {
    /// The declared key set only has meaning under C2PL; OCC accepts any
    /// declaration and ignores it.
    fn begin(&self, type_name: &str, _keys: &[String]) -> Result<Transaction, TxnLabError> {
        let txn_id = self.txn_id_counter.fetch_add(1, Ordering::AcqRel) + 1;
        // Snapshot, not increment: begins are invisible to the timestamp
        // order until the transaction reaches validation.
        let start_ts = self.timestamp_counter.load(Ordering::Acquire);
        self.active.lock().push((txn_id, start_ts));
        Ok(Transaction::new(txn_id, type_name, start_ts))
    }

    fn read(&self, txn: &mut Transaction, key: &str) -> Result<Option<String>, TxnLabError> {
        txn.read(key, &self.store)
    }

    fn write(&self, txn: &mut Transaction, key: &str, value: &str) -> Result<(), TxnLabError> {
        txn.write(key, value)
    }

    fn commit(&self, txn: &mut Transaction) -> Result<CommitResult, TxnLabError> {
        txn.check_active("commit")?;

        let _serialization_point = self.validation_mutex.lock();

        txn.validation_ts = self.timestamp_counter.fetch_add(1, Ordering::AcqRel) + 1;

        if !self.validate(txn) {
            txn.status = TxnStatus::Aborted;
            self.unregister_active(txn.txn_id);
            return Ok(CommitResult {
                success: false,
                txn_id: txn.txn_id,
                retries: txn.retry_count,
            });
        }

        for (key, value) in &txn.write_set {
            self.store.put(key, value);
        }

        txn.finish_ts = self.timestamp_counter.fetch_add(1, Ordering::AcqRel) + 1;
        txn.status = TxnStatus::Committed;

        let record = CommittedTxnRecord {
            txn_id: txn.txn_id,
            finish_ts: txn.finish_ts,
            write_keys: txn.write_set.keys().cloned().collect(),
        };
        self.committed_history.lock().push(record);
        self.unregister_active(txn.txn_id);

        let commits = self.commits_since_gc.fetch_add(1, Ordering::Relaxed) + 1;
        if commits % GC_COMMIT_INTERVAL == 0 {
            self.garbage_collect(self.min_active_start_ts());
        }

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
        self.unregister_active(txn.txn_id);
    }

    fn protocol_name(&self) -> &'static str {
        "OCC"
    }
}
