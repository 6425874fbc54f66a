//! Derived history store for Strand.
//!
//! History tables hold what ingestion derives from the source chain:
//! ledgers, transactions, operations, effects, trades and participant
//! indices. Every row is keyed by a packed [`strand_types::Toid`], so an id
//! range covers a ledger range in every table.
//!
//! # Key Types
//!
//! - [`HistoryStore`] — transactional write/read boundary
//! - [`Row`], [`Column`] — per-table column descriptors
//! - [`BatchInsertBuilder`] — accumulates rows until flush
//! - [`InMemoryHistoryStore`] — in-memory backend
//! - [`HistoryQueries`] — typed reads

pub mod error;
pub mod memory;
pub mod queries;
pub mod rows;
pub mod schema;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryHistoryStore;
pub use queries::HistoryQueries;
pub use rows::{
    AccountRow, EffectRow, LedgerRow, OperationParticipantRow, OperationRow, TradeRow,
    TransactionParticipantRow, TransactionRow,
};
pub use schema::{AccountRef, BatchInsertBuilder, Column, InsertBatch, Record, Row, Table};
pub use traits::HistoryStore;
