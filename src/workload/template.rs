use crate::manager::{CommitResult, TransactionManager};
use crate::TxnLabError;

const TRANSFER_AMOUNT: i64 = 10;

/// The fixed transaction shapes a workload is built from.
///
/// Each template declares how many distinct input keys it needs and runs one
/// complete transaction attempt against whichever manager it is handed. The
/// key set is passed to `begin` so C2PL can lock it up front; OCC ignores it
/// there but the body touches the same keys either way. A failed attempt
/// (OCC validation conflict) leaves retrying to the executor, which calls
/// `execute` again for a fresh transaction.
///
/// Values are string-encoded decimal integers; an absent key reads as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadTemplate {
    /// Move a fixed amount between two accounts. Zero-sum.
    Transfer,
    /// Read a single account and commit. Still validated under OCC.
    BalanceCheck,
    /// Increment each of `keys` accounts by one; adds exactly `keys` to the
    /// aggregate balance per commit.
    WriteHeavy { keys: usize },
}

fn as_balance(value: Option<String>) -> i64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

impl WorkloadTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            WorkloadTemplate::Transfer => "transfer",
            WorkloadTemplate::BalanceCheck => "balance_check",
            WorkloadTemplate::WriteHeavy { .. } => "write_heavy",
        }
    }

    pub fn num_input_keys(&self) -> usize {
        match self {
            WorkloadTemplate::Transfer => 2,
            WorkloadTemplate::BalanceCheck => 1,
            WorkloadTemplate::WriteHeavy { keys } => *keys,
        }
    }

    pub fn execute<M: TransactionManager>(
        &self,
        manager: &M,
        keys: &[String],
    ) -> Result<CommitResult, TxnLabError> {
        match self {
            WorkloadTemplate::Transfer => {
                let mut txn = manager.begin(self.name(), keys)?;

                let from = as_balance(manager.read(&mut txn, &keys[0])?);
                let to = as_balance(manager.read(&mut txn, &keys[1])?);

                manager.write(&mut txn, &keys[0], &(from - TRANSFER_AMOUNT).to_string())?;
                manager.write(&mut txn, &keys[1], &(to + TRANSFER_AMOUNT).to_string())?;

                manager.commit(&mut txn)
            }
            WorkloadTemplate::BalanceCheck => {
                let mut txn = manager.begin(self.name(), keys)?;
                manager.read(&mut txn, &keys[0])?;
                manager.commit(&mut txn)
            }
            WorkloadTemplate::WriteHeavy { .. } => {
                let mut txn = manager.begin(self.name(), keys)?;
                for key in keys {
                    let current = as_balance(manager.read(&mut txn, key)?);
                    manager.write(&mut txn, key, &(current + 1).to_string())?;
                }
                manager.commit(&mut txn)
            }
        }
    }
}
