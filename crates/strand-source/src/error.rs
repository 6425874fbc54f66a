/// Errors produced by the source ledger database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("failed to decode {what} of tx {index} in ledger {ledger}: {reason}")]
    Decode {
        ledger: u32,
        index: u32,
        what: &'static str,
        reason: String,
    },

    #[error("ledger {0} not found")]
    LedgerNotFound(u32),

    #[error("ledger {sequence} cannot be appended: {reason}")]
    InvalidAppend { sequence: u32, reason: String },

    #[error("cursor report failed: {0}")]
    Report(String),
}

pub type SourceResult<T> = Result<T, SourceError>;
