use strand_types::LedgerHeader;

use crate::error::SourceResult;
use crate::record::{FeeRecord, TransactionRecord};

/// Read boundary for the source ledger database.
pub trait LedgerSource: Send + Sync {
    /// Newest closed ledger, or `None` when the source is empty.
    fn latest_ledger(&self) -> SourceResult<Option<u32>>;

    /// Oldest ledger still available.
    fn elder_ledger(&self) -> SourceResult<Option<u32>>;

    fn ledger_header(&self, sequence: u32) -> SourceResult<Option<LedgerHeader>>;

    /// Headers of the available ledgers in `start..=end`, ascending.
    fn ledger_headers(&self, start: u32, end: u32) -> SourceResult<Vec<LedgerHeader>> {
        let mut headers = Vec::new();
        for sequence in start..=end {
            if let Some(header) = self.ledger_header(sequence)? {
                headers.push(header);
            }
        }
        Ok(headers)
    }

    /// The first available ledger with a sequence greater than `sequence`.
    fn first_ledger_after(&self, sequence: u32) -> SourceResult<Option<u32>>;

    /// Transactions of a ledger, ordered by application order.
    fn transactions(&self, sequence: u32) -> SourceResult<Vec<TransactionRecord>>;

    /// Fee changes of a ledger, ordered by application order.
    fn transaction_fees(&self, sequence: u32) -> SourceResult<Vec<FeeRecord>>;
}

/// Outbound report of the last fully ingested ledger, letting the source
/// prune data it no longer needs to keep.
pub trait CursorReporter: Send + Sync {
    fn set_cursor(&self, name: &str, sequence: u32) -> SourceResult<()>;
}

/// Reporter that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl CursorReporter for NoopReporter {
    fn set_cursor(&self, _name: &str, _sequence: u32) -> SourceResult<()> {
        Ok(())
    }
}
