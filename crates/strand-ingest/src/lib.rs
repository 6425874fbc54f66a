//! History ingestion for Strand.
//!
//! Ingestion walks ledgers from the source database, derives history rows
//! (ledgers, transactions, operations, effects, trades, participants) and
//! writes them to the history store one committed ledger at a time. A
//! [`System`] drives it on a timer and serializes every writer behind a
//! single session slot.
//!
//! # Key Types
//!
//! - [`System`] — single-flight orchestration, ticks and reingestion
//! - [`Session`] — one pass over an inclusive ledger range
//! - [`Cursor`] — ledger/transaction/operation traversal
//! - [`Ingestion`] — batched row writer over a [`strand_history::HistoryStore`]
//! - [`EffectType`], [`EffectSink`] — effect derivation output
//! - [`IngestConfig`] — TOML-loadable settings

pub mod config;
pub mod cursor;
pub mod details;
pub mod effects;
pub mod error;
pub mod ingestion;
pub mod participants;
pub mod results;
pub mod session;
pub mod system;
pub mod trades;

#[cfg(test)]
mod testutil;

pub use config::IngestConfig;
pub use cursor::{Cursor, OperationView};
pub use effects::{EffectIngestion, EffectRecord, EffectSink, EffectType};
pub use error::{IngestError, IngestResult};
pub use ingestion::{Ingestion, LedgerCounts, CURRENT_VERSION};
pub use session::{Session, SessionState, SessionStats};
pub use system::{LedgerState, SessionId, SessionSlot, System, Ticker, TickOutcome};
