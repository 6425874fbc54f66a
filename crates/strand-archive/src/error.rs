use strand_types::{Hash256, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("unable to get checkpoint state at ledger sequence {0}")]
    CheckpointNotFound(u32),

    #[error("invalid checkpoint state: {0}")]
    InvalidState(String),

    #[error("bucket hash does not exist: {0}")]
    BucketNotFound(Hash256),

    #[error("bucket {bucket} record {index}: {reason}")]
    CorruptBucket {
        bucket: Hash256,
        index: u64,
        reason: String,
    },

    #[error("bucket content hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: Hash256, actual: Hash256 },

    #[error("archive unavailable: {0}")]
    Unavailable(String),

    #[error("reader misuse: {0}")]
    ReaderState(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Type(#[from] TypeError),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
