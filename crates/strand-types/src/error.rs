use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid account address: {0}")]
    InvalidAddress(String),

    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("id component out of range: {component}={value} (max {max})")]
    IdOutOfRange {
        component: &'static str,
        value: u64,
        max: u64,
    },

    #[error("invalid before-and-after state for {0} entry")]
    EmptyChange(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
