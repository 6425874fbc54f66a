use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use strand_types::{
    codec, Hash256, LedgerEntryChange, LedgerHeader, TransactionEnvelope, TransactionMeta,
    TransactionResult,
};
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::record::{FeeRecord, TransactionRecord};
use crate::traits::{CursorReporter, LedgerSource};

/// A transaction to append to an [`InMemoryLedgerSource`].
#[derive(Clone, Debug)]
pub struct SourceTransaction {
    pub envelope: TransactionEnvelope,
    pub result: TransactionResult,
    pub meta: TransactionMeta,
    pub fee_changes: Vec<LedgerEntryChange>,
}

impl SourceTransaction {
    pub fn new(
        envelope: TransactionEnvelope,
        result: TransactionResult,
        meta: TransactionMeta,
    ) -> Self {
        Self {
            envelope,
            result,
            meta,
            fee_changes: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StoredLedger {
    pub header: LedgerHeader,
    pub transactions: Vec<TransactionRecord>,
    pub fees: Vec<FeeRecord>,
}

#[derive(Default)]
struct SourceState {
    ledgers: BTreeMap<u32, StoredLedger>,
    unavailable: bool,
}

/// In-memory source database for tests, local demos, and embedding.
#[derive(Default)]
pub struct InMemoryLedgerSource {
    inner: RwLock<SourceState>,
}

impl InMemoryLedgerSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close a new ledger on top of the current chain tip.
    ///
    /// The header's hash commits to its sequence, parent hash, close time and
    /// transaction hashes, so every appended ledger links to its parent.
    pub fn append_ledger(
        &self,
        close_time: u64,
        transactions: Vec<SourceTransaction>,
    ) -> SourceResult<LedgerHeader> {
        let mut state = self.write()?;
        let (sequence, previous_hash) = match state.ledgers.last_key_value() {
            Some((seq, tip)) => (seq + 1, tip.header.hash),
            None => (1, Hash256::zero()),
        };

        let mut records = Vec::with_capacity(transactions.len());
        let mut fees = Vec::with_capacity(transactions.len());
        for (index, tx) in transactions.iter().enumerate() {
            let order = index as u32 + 1;
            records.push(TransactionRecord::encode(
                sequence,
                order,
                &tx.envelope,
                &tx.result,
                &tx.meta,
            )?);
            fees.push(FeeRecord::encode(sequence, order, &tx.fee_changes)?);
        }

        let tx_hashes: Vec<Hash256> = records.iter().map(|r| r.hash).collect();
        let preimage = codec::encode(&(sequence, previous_hash, close_time, &tx_hashes)).map_err(
            |e| SourceError::InvalidAppend {
                sequence,
                reason: e.to_string(),
            },
        )?;
        let header = LedgerHeader {
            sequence,
            hash: Hash256::digest(&preimage),
            previous_hash,
            close_time,
            protocol_version: 12,
            total_coins: 1_000_000_000_000_000_000,
            fee_pool: records.len() as i64 * 100,
            base_fee: 100,
            base_reserve: 5_000_000,
            max_tx_set_size: 1000,
        };

        debug!(sequence, transactions = records.len(), "source: ledger closed");
        state.ledgers.insert(
            sequence,
            StoredLedger {
                header: header.clone(),
                transactions: records,
                fees,
            },
        );
        Ok(header)
    }

    /// Store a ledger verbatim, without chain checks.
    pub fn insert_ledger(&self, ledger: StoredLedger) -> SourceResult<()> {
        let mut state = self.write()?;
        state.ledgers.insert(ledger.header.sequence, ledger);
        Ok(())
    }

    pub fn ledger(&self, sequence: u32) -> SourceResult<Option<StoredLedger>> {
        Ok(self.read()?.ledgers.get(&sequence).cloned())
    }

    pub fn remove_ledger(&self, sequence: u32) -> SourceResult<Option<StoredLedger>> {
        Ok(self.write()?.ledgers.remove(&sequence))
    }

    /// Drop every ledger older than `sequence`, as a source does after it
    /// catches up from a recent checkpoint.
    pub fn prune_before(&self, sequence: u32) -> SourceResult<usize> {
        let mut state = self.write()?;
        let kept = state.ledgers.split_off(&sequence);
        let removed = state.ledgers.len();
        state.ledgers = kept;
        Ok(removed)
    }

    /// Make every read fail, simulating a lost connection.
    pub fn set_unavailable(&self, unavailable: bool) -> SourceResult<()> {
        self.write()?.unavailable = unavailable;
        Ok(())
    }

    fn read(&self) -> SourceResult<RwLockReadGuard<'_, SourceState>> {
        self.inner
            .read()
            .map_err(|_| SourceError::Unavailable("source read lock poisoned".into()))
    }

    fn write(&self) -> SourceResult<RwLockWriteGuard<'_, SourceState>> {
        self.inner
            .write()
            .map_err(|_| SourceError::Unavailable("source write lock poisoned".into()))
    }

    fn available(&self) -> SourceResult<RwLockReadGuard<'_, SourceState>> {
        let state = self.read()?;
        if state.unavailable {
            return Err(SourceError::Unavailable("connection refused".into()));
        }
        Ok(state)
    }
}

impl LedgerSource for InMemoryLedgerSource {
    fn latest_ledger(&self) -> SourceResult<Option<u32>> {
        Ok(self.available()?.ledgers.keys().next_back().copied())
    }

    fn elder_ledger(&self) -> SourceResult<Option<u32>> {
        Ok(self.available()?.ledgers.keys().next().copied())
    }

    fn ledger_header(&self, sequence: u32) -> SourceResult<Option<LedgerHeader>> {
        Ok(self
            .available()?
            .ledgers
            .get(&sequence)
            .map(|l| l.header.clone()))
    }

    fn ledger_headers(&self, start: u32, end: u32) -> SourceResult<Vec<LedgerHeader>> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .available()?
            .ledgers
            .range(start..=end)
            .map(|(_, l)| l.header.clone())
            .collect())
    }

    fn first_ledger_after(&self, sequence: u32) -> SourceResult<Option<u32>> {
        let state = self.available()?;
        let Some(next) = sequence.checked_add(1) else {
            return Ok(None);
        };
        Ok(state.ledgers.range(next..).next().map(|(seq, _)| *seq))
    }

    fn transactions(&self, sequence: u32) -> SourceResult<Vec<TransactionRecord>> {
        Ok(self
            .available()?
            .ledgers
            .get(&sequence)
            .map(|l| l.transactions.clone())
            .unwrap_or_default())
    }

    fn transaction_fees(&self, sequence: u32) -> SourceResult<Vec<FeeRecord>> {
        Ok(self
            .available()?
            .ledgers
            .get(&sequence)
            .map(|l| l.fees.clone())
            .unwrap_or_default())
    }
}

/// Reporter that remembers every report, optionally failing them.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, u32)>>,
    failing: Mutex<bool>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().expect("reporter mutex poisoned") = failing;
    }

    pub fn reports(&self) -> Vec<(String, u32)> {
        self.reports.lock().expect("reporter mutex poisoned").clone()
    }
}

impl CursorReporter for RecordingReporter {
    fn set_cursor(&self, name: &str, sequence: u32) -> SourceResult<()> {
        if *self.failing.lock().expect("reporter mutex poisoned") {
            return Err(SourceError::Report(format!(
                "set cursor {name}={sequence}: connection refused"
            )));
        }
        self.reports
            .lock()
            .expect("reporter mutex poisoned")
            .push((name.to_string(), sequence));
        Ok(())
    }
}
