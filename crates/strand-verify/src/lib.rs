//! State verification for Strand.
//!
//! [`StateVerifier`] cross-checks the entries a local store holds against
//! the canonical state of a checkpoint, one bounded batch at a time, so
//! neither side is ever held in memory in full.
//!
//! Errors are split in two classes: [`StateError`] means the local state is
//! wrong and must be escalated; every other [`VerifyError`] is a failure to
//! read or compare and may be retried.

pub mod error;
pub mod verifier;

pub use error::{StateError, VerifyError, VerifyResult};
pub use verifier::{EntryStream, StateVerifier, TransformFn};
