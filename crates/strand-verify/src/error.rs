use strand_archive::ArchiveError;
use strand_types::TypeError;
use thiserror::Error;

/// Local state disagrees with the checkpoint. Never retried; an operator
/// has to look at it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("entries ({count}) not found locally, example: {example}")]
    UnreadEntries { count: usize, example: String },

    #[error("cannot find entry in current batch: {entry} (key = {key})")]
    MissingEntry { entry: String, key: String },

    #[error(
        "entry does not match the fetched entry. expected (archive): {expected} \
         (pretransform = {pretransform}), actual (local): {actual}"
    )]
    Mismatch {
        expected: String,
        pretransform: String,
        actual: String,
    },

    #[error("number of entries read from the archive ({read}) does not match number of local entries ({local})")]
    CountMismatch { read: u64, local: u64 },
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("there are unread entries in the state stream; drain it before calling verify")]
    StreamNotDrained,

    #[error("entry accepted by get_ledger_entries but ignored by write: {0}; the transform function is inconsistent")]
    InconsistentTransform(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl VerifyError {
    /// Whether this error means the local state is wrong, as opposed to a
    /// failure reading or comparing it.
    pub fn is_state_error(&self) -> bool {
        matches!(self, VerifyError::State(_))
    }
}

pub type VerifyResult<T> = Result<T, VerifyError>;
