//! Fixtures for unit tests that need an [`OperationView`].

use strand_source::{Transaction, TransactionRecord};
use strand_types::{
    AccountEntry, AccountId, Hash256, LedgerEntry, LedgerEntryChange, LedgerEntryData,
    LedgerHeader, Memo, Operation, OperationBody, OperationMeta, OperationResult,
    OperationResultTr, Signer, Toid, TransactionEnvelope, TransactionMeta, TransactionResult,
    TransactionResultCode,
};

use crate::cursor::OperationView;

pub const LEDGER: u32 = 7;

pub fn source() -> AccountId {
    AccountId::from_seed("source")
}

pub fn op(body: OperationBody) -> Operation {
    Operation {
        source_account: None,
        body,
    }
}

pub fn header(sequence: u32) -> LedgerHeader {
    LedgerHeader {
        sequence,
        hash: Hash256::digest(&sequence.to_be_bytes()),
        previous_hash: Hash256::digest(&(sequence - 1).to_be_bytes()),
        close_time: 1_600_000_000 + u64::from(sequence) * 5,
        protocol_version: 12,
        total_coins: 1_000_000,
        fee_pool: 0,
        base_fee: 100,
        base_reserve: 5_000_000,
        max_tx_set_size: 100,
    }
}

pub fn account_entry(account_id: AccountId, master_weight: u8, signers: Vec<Signer>) -> LedgerEntry {
    LedgerEntry::new(
        LEDGER,
        LedgerEntryData::Account(AccountEntry {
            account_id,
            balance: 100_000_000,
            seq_num: 1,
            num_sub_entries: signers.len() as u32,
            inflation_dest: None,
            flags: 0,
            home_domain: String::new(),
            thresholds: [master_weight, 0, 0, 0],
            signers,
        }),
    )
}

/// A one-transaction ledger.
pub struct Fixture {
    pub ledger: LedgerHeader,
    pub tx: Transaction,
}

impl Fixture {
    pub fn new(
        operations: Vec<Operation>,
        results: Vec<Option<OperationResultTr>>,
        changes: Vec<Vec<LedgerEntryChange>>,
        code: TransactionResultCode,
    ) -> Self {
        let envelope = TransactionEnvelope {
            source_account: source(),
            fee: 100,
            seq_num: 2,
            time_bounds: None,
            memo: Memo::None,
            operations,
            signatures: vec![],
        };
        let result = TransactionResult {
            fee_charged: 100,
            code,
            results: results
                .into_iter()
                .map(|r| r.map_or(OperationResult::NotSupported, OperationResult::Inner))
                .collect(),
        };
        let meta = TransactionMeta {
            tx_changes: vec![],
            operations: changes.into_iter().map(OperationMeta::new).collect(),
        };
        let record = TransactionRecord {
            ledger_sequence: LEDGER,
            application_order: 1,
            hash: Hash256::digest(b"fixture"),
            envelope: vec![],
            result: vec![],
            meta: vec![],
        };
        Self {
            ledger: header(LEDGER),
            tx: Transaction {
                ledger_sequence: LEDGER,
                application_order: 1,
                hash: record.hash,
                envelope,
                result,
                meta,
                fee_changes: vec![],
                record,
                fee_record: None,
            },
        }
    }

    /// A successful transaction holding one operation.
    pub fn single(
        body: OperationBody,
        result: Option<OperationResultTr>,
        changes: Vec<LedgerEntryChange>,
    ) -> Self {
        Self::new(
            vec![op(body)],
            vec![result],
            vec![changes],
            TransactionResultCode::Success,
        )
    }

    pub fn view(&self) -> OperationView<'_> {
        self.view_at(0)
    }

    pub fn view_at(&self, index: usize) -> OperationView<'_> {
        let operation = &self.tx.envelope.operations[index];
        let order = index as u32 + 1;
        OperationView {
            operation_id: Toid::new(LEDGER, 1, order).to_i64(),
            order,
            source: self.tx.operation_source(operation),
            operation,
            result: self.tx.result.results.get(index).and_then(|r| r.inner()),
            changes: self
                .tx
                .meta
                .operations
                .get(index)
                .map_or(&[], |m| m.changes.as_slice()),
            transaction: &self.tx,
            ledger: &self.ledger,
        }
    }
}
