mod core;
mod manager;
mod metrics;
mod store;
mod txn;
mod workload;

pub use crate::core::errors::TxnLabError;
pub use crate::manager::{CommitResult, LockTable, OccManager, TransactionManager, TwoPlManager};
pub use crate::metrics::{MetricsCollector, MetricsReport, TypeReport};
pub use crate::store::Store;
pub use crate::txn::{Timestamp, Transaction, TxnId, TxnStatus};
pub use crate::workload::selector::account_key;
pub use crate::workload::{
    ContentionConfig, ExecutorConfig, KeySelector, WorkloadExecutor, WorkloadTemplate,
};
