use strand_history::StoreError;
use strand_source::SourceError;
use strand_types::{Hash256, LedgerEntryType, OperationType, TypeError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum IngestError {
    #[error("source: {0}")]
    Source(#[from] SourceError),

    #[error("history store: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("ledger {sequence} not found in source")]
    MissingLedger { sequence: u32 },

    #[error("ledger {sequence} does not follow its parent: previous hash {previous_hash}, parent hash {parent_hash}")]
    ChainBroken {
        sequence: u32,
        previous_hash: Hash256,
        parent_hash: Hash256,
    },

    #[error("operation {operation_id} of type {expected} carries a {actual} result")]
    ResultMismatch {
        operation_id: i64,
        expected: OperationType,
        actual: String,
    },

    #[error("operation {operation_id} recorded no change to its {entry_type} entry")]
    MissingChange {
        operation_id: i64,
        entry_type: LedgerEntryType,
    },

    #[error("ledger close time {0} is out of range")]
    InvalidCloseTime(u64),

    #[error("invalid ledger range {start}..={end}")]
    InvalidRange { start: u32, end: u32 },

    #[error("invalid session state: {0}")]
    InvalidState(String),

    #[error("ingestion panicked: {0}")]
    Panicked(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    #[error("config error: {0}")]
    Config(String),
}

impl IngestError {
    /// Whether this error means the data itself is inconsistent. State errors
    /// are never retried automatically.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            IngestError::MissingLedger { .. } | IngestError::ChainBroken { .. }
        )
    }

    /// Whether retrying the same range from scratch may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, IngestError::Source(_) | IngestError::Store(_))
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
