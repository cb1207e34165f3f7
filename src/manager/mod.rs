pub mod occ;
pub mod twopl;

pub use occ::OccManager;
pub use twopl::{LockTable, TwoPlManager};

use crate::txn::{Transaction, TxnId};
use crate::TxnLabError;

/// Outcome of a commit attempt.
#[derive(Debug, Clone, Copy)]
pub struct CommitResult {
    /// Always `true` under C2PL; `false` under OCC on a validation conflict.
    pub success: bool,
    pub txn_id: TxnId,
    /// Lock-acquisition retries under C2PL; 0 under OCC.
    pub retries: u32,
}

/// The transactional contract shared by both protocols.
///
/// Managers are shared by reference across worker threads; the transaction
/// object stays owned by its worker and is passed back in by `&mut`.
/// Workload code takes the manager as a capability (`&M`), so a protocol is
/// chosen once at startup and everything downstream is protocol-agnostic.
pub trait TransactionManager: Send + Sync {
    /// Start a transaction. `keys` is the declared working set, required for
    /// C2PL lock acquisition and ignored by OCC. C2PL rejects a malformed
    /// declaration (an empty or duplicate key) before acquiring anything.
    fn begin(&self, type_name: &str, keys: &[String]) -> Result<Transaction, TxnLabError>;

    fn read(&self, txn: &mut Transaction, key: &str) -> Result<Option<String>, TxnLabError>;

    fn write(&self, txn: &mut Transaction, key: &str, value: &str) -> Result<(), TxnLabError>;

    fn commit(&self, txn: &mut Transaction) -> Result<CommitResult, TxnLabError>;

    fn abort(&self, txn: &mut Transaction);

    fn protocol_name(&self) -> &'static str;
}
