pub mod transaction;

pub use transaction::{Transaction, TxnStatus};

pub type TxnId = u64;
pub type Timestamp = u64;

#[cfg(test)]
mod tests;
