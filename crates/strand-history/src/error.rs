use crate::schema::Table;

/// Errors from history store operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// A transaction is already open on this store.
    #[error("a transaction is already in progress")]
    TransactionInProgress,

    /// Commit was called without an open transaction.
    #[error("no transaction in progress")]
    NoTransaction,

    /// A batch did not match the table's column layout.
    #[error("schema mismatch on {table}: {reason}")]
    Schema { table: Table, reason: String },

    /// An account column still holds an address at insert time.
    #[error("unresolved account {address} in {table}")]
    UnresolvedAccount { table: Table, address: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
