use std::collections::HashMap;
use std::sync::Arc;

use strand_source::{LedgerSource, Transaction};
use strand_types::{
    change_for_key, AccountId, Change, LedgerEntryChange, LedgerHeader, LedgerKey, Operation,
    OperationResultTr, OperationType, Toid,
};
use tracing::trace;

use crate::error::{IngestError, IngestResult};

struct LoadedLedger {
    header: LedgerHeader,
    transactions: Vec<Transaction>,
}

/// Everything effect derivation needs to know about the current operation.
#[derive(Clone, Copy)]
pub struct OperationView<'a> {
    pub operation_id: i64,
    /// 1-based order within the transaction.
    pub order: u32,
    pub source: AccountId,
    pub operation: &'a Operation,
    /// The operation's result arm. Absent when the transaction failed
    /// before operations were applied.
    pub result: Option<&'a OperationResultTr>,
    pub changes: &'a [LedgerEntryChange],
    pub transaction: &'a Transaction,
    pub ledger: &'a LedgerHeader,
}

impl<'a> OperationView<'a> {
    pub fn operation_type(&self) -> OperationType {
        self.operation.body.operation_type()
    }

    /// Pre- and post-image of `key` across this operation; `None` when the
    /// operation recorded no change for it.
    pub fn before_and_after(&self, key: &LedgerKey) -> Option<Change> {
        change_for_key(self.changes, key)
    }

    pub fn successful(&self) -> bool {
        self.transaction.is_successful()
    }

    /// The result arm, or a mismatch error naming what was found instead.
    pub fn require_result(&self) -> IngestResult<&'a OperationResultTr> {
        self.result.ok_or_else(|| IngestError::ResultMismatch {
            operation_id: self.operation_id,
            expected: self.operation_type(),
            actual: "missing".into(),
        })
    }

    pub(crate) fn mismatch(&self, actual: &OperationResultTr) -> IngestError {
        IngestError::ResultMismatch {
            operation_id: self.operation_id,
            expected: self.operation_type(),
            actual: actual.tag().to_string(),
        }
    }
}

/// Walks ledgers, their transactions, and their operations over an
/// inclusive ledger range.
///
/// Each `next_*` call advances one level and resets the levels below it.
/// A failed ledger load ends traversal for good: every later advance
/// returns `false`, even after the error is taken with [`Cursor::take_err`].
pub struct Cursor {
    source: Arc<dyn LedgerSource>,
    first: u32,
    last: u32,
    sequence: Option<u32>,
    ledger: Option<LoadedLedger>,
    tx: Option<usize>,
    op: Option<usize>,
    err: Option<IngestError>,
    terminated: bool,
}

impl Cursor {
    pub fn new(source: Arc<dyn LedgerSource>, first: u32, last: u32) -> Self {
        Self {
            source,
            first,
            last,
            sequence: None,
            ledger: None,
            tx: None,
            op: None,
            err: None,
            terminated: false,
        }
    }

    pub fn first_ledger(&self) -> u32 {
        self.first
    }

    pub fn last_ledger(&self) -> u32 {
        self.last
    }

    pub fn next_ledger(&mut self) -> bool {
        if self.terminated {
            return false;
        }
        let next = match self.sequence {
            None => self.first,
            Some(seq) if seq >= self.last => return self.finish(),
            Some(seq) => seq + 1,
        };
        if next > self.last {
            return self.finish();
        }

        self.sequence = Some(next);
        self.tx = None;
        self.op = None;
        match self.load(next) {
            Ok(ledger) => {
                self.ledger = Some(ledger);
                true
            }
            Err(e) => {
                self.ledger = None;
                self.err = Some(e);
                self.terminated = true;
                false
            }
        }
    }

    pub fn next_tx(&mut self) -> bool {
        let Some(ledger) = &self.ledger else {
            return false;
        };
        let next = self.tx.map_or(0, |i| i + 1);
        if next >= ledger.transactions.len() {
            return false;
        }
        self.tx = Some(next);
        self.op = None;
        true
    }

    pub fn next_op(&mut self) -> bool {
        let (Some(ledger), Some(tx)) = (&self.ledger, self.tx) else {
            return false;
        };
        let next = self.op.map_or(0, |i| i + 1);
        if next >= ledger.transactions[tx].envelope.operations.len() {
            return false;
        }
        self.op = Some(next);
        true
    }

    pub fn in_ledger(&self) -> bool {
        self.ledger.is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_ledger() && self.tx.is_some()
    }

    pub fn in_operation(&self) -> bool {
        self.in_transaction() && self.op.is_some()
    }

    /// The load error that stopped traversal, if any.
    pub fn err(&self) -> Option<&IngestError> {
        self.err.as_ref()
    }

    pub fn take_err(&mut self) -> Option<IngestError> {
        self.err.take()
    }

    /// # Panics
    ///
    /// Panics unless positioned on a ledger.
    pub fn ledger(&self) -> &LedgerHeader {
        &self.loaded().header
    }

    pub fn ledger_sequence(&self) -> u32 {
        self.ledger().sequence
    }

    pub fn ledger_id(&self) -> i64 {
        Toid::ledger(self.ledger_sequence()).to_i64()
    }

    /// Id range `[start, end)` of every row belonging to the current ledger.
    pub fn ledger_range(&self) -> (i64, i64) {
        Toid::ledger_range(self.ledger_sequence())
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.loaded().transactions
    }

    /// # Panics
    ///
    /// Panics unless positioned on a transaction.
    pub fn transaction(&self) -> &Transaction {
        let tx = self.tx.expect("cursor is not positioned on a transaction");
        &self.loaded().transactions[tx]
    }

    pub fn transaction_fee(&self) -> &[LedgerEntryChange] {
        &self.transaction().fee_changes
    }

    pub fn transaction_id(&self) -> i64 {
        let tx = self.transaction();
        Toid::new(tx.ledger_sequence, tx.application_order, 0).to_i64()
    }

    /// # Panics
    ///
    /// Panics unless positioned on an operation.
    pub fn operation(&self) -> &Operation {
        &self.transaction().envelope.operations[self.op_index()]
    }

    pub fn operation_order(&self) -> u32 {
        self.op_index() as u32 + 1
    }

    pub fn operation_id(&self) -> i64 {
        let tx = self.transaction();
        Toid::new(tx.ledger_sequence, tx.application_order, self.operation_order()).to_i64()
    }

    pub fn operation_type(&self) -> OperationType {
        self.operation().body.operation_type()
    }

    pub fn operation_source_account(&self) -> AccountId {
        self.transaction().operation_source(self.operation())
    }

    pub fn operation_result(&self) -> Option<&OperationResultTr> {
        self.transaction()
            .result
            .results
            .get(self.op_index())
            .and_then(|r| r.inner())
    }

    pub fn operation_changes(&self) -> &[LedgerEntryChange] {
        self.transaction()
            .meta
            .operations
            .get(self.op_index())
            .map_or(&[], |m| m.changes.as_slice())
    }

    /// See [`OperationView::before_and_after`].
    pub fn before_and_after(&self, key: &LedgerKey) -> Option<Change> {
        change_for_key(self.operation_changes(), key)
    }

    pub fn operation_view(&self) -> OperationView<'_> {
        OperationView {
            operation_id: self.operation_id(),
            order: self.operation_order(),
            source: self.operation_source_account(),
            operation: self.operation(),
            result: self.operation_result(),
            changes: self.operation_changes(),
            transaction: self.transaction(),
            ledger: self.ledger(),
        }
    }

    pub fn successful_transaction_count(&self) -> usize {
        self.transactions()
            .iter()
            .filter(|tx| tx.is_successful())
            .count()
    }

    pub fn failed_transaction_count(&self) -> usize {
        self.transactions().len() - self.successful_transaction_count()
    }

    /// Operations in the ledger's successful transactions.
    pub fn successful_ledger_operation_count(&self) -> usize {
        self.transactions()
            .iter()
            .filter(|tx| tx.is_successful())
            .map(Transaction::operation_count)
            .sum()
    }

    fn finish(&mut self) -> bool {
        self.ledger = None;
        self.tx = None;
        self.op = None;
        false
    }

    fn loaded(&self) -> &LoadedLedger {
        self.ledger
            .as_ref()
            .expect("cursor is not positioned on a ledger")
    }

    fn op_index(&self) -> usize {
        self.op.expect("cursor is not positioned on an operation")
    }

    fn load(&self, sequence: u32) -> IngestResult<LoadedLedger> {
        let header = self
            .source
            .ledger_header(sequence)?
            .ok_or(IngestError::MissingLedger { sequence })?;
        let records = self.source.transactions(sequence)?;
        let fees: HashMap<u32, _> = self
            .source
            .transaction_fees(sequence)?
            .into_iter()
            .map(|fee| (fee.application_order, fee))
            .collect();

        let mut transactions = Vec::with_capacity(records.len());
        for record in &records {
            let tx = record.decode(fees.get(&record.application_order))?;
            Toid::new(sequence, tx.application_order, tx.operation_count() as u32).validate()?;
            transactions.push(tx);
        }
        transactions.sort_by_key(|tx| tx.application_order);
        trace!(sequence, transactions = transactions.len(), "cursor: ledger loaded");
        Ok(LoadedLedger {
            header,
            transactions,
        })
    }
}
