use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxnLabError {
    #[error("store error: {0}")]
    Store(#[from] sled::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid transaction state: {0}")]
    InvalidTransactionState(String),

    #[error("malformed key set: {0}")]
    MalformedKeySet(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
