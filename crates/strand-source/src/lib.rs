//! Source ledger database boundary for Strand.
//!
//! The source database is the read-only origin of ledger-close data. It
//! exposes headers, encoded transaction blobs and fee changes by ledger
//! sequence, and accepts a best-effort report of the last ingested ledger.

pub mod error;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{SourceError, SourceResult};
pub use memory::{InMemoryLedgerSource, RecordingReporter, SourceTransaction, StoredLedger};
pub use record::{FeeRecord, Transaction, TransactionRecord};
pub use traits::{CursorReporter, LedgerSource, NoopReporter};
