//! Shared fixtures for strand-ingest integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use strand_history::InMemoryHistoryStore;
use strand_ingest::{IngestConfig, System};
use strand_source::{CursorReporter, InMemoryLedgerSource, LedgerSource, NoopReporter, SourceTransaction};
use strand_types::{
    AccountId, Asset, CreateAccountOp, Memo, OpResult, Operation, OperationBody, OperationMeta,
    OperationResult, OperationResultTr, PaymentOp, TransactionEnvelope, TransactionMeta,
    TransactionResult, TransactionResultCode,
};

pub const CLOSE_TIME: u64 = 1_600_000_000;

pub fn account(seed: &str) -> AccountId {
    AccountId::from_seed(seed)
}

/// A transaction from `source` with one successful operation per entry of
/// `operations`.
pub fn transaction(
    source: &str,
    seq_num: i64,
    operations: Vec<(OperationBody, OperationResultTr)>,
    code: TransactionResultCode,
) -> SourceTransaction {
    let (bodies, results): (Vec<_>, Vec<_>) = operations.into_iter().unzip();
    let envelope = TransactionEnvelope {
        source_account: account(source),
        fee: 100,
        seq_num,
        time_bounds: None,
        memo: Memo::None,
        operations: bodies
            .into_iter()
            .map(|body| Operation {
                source_account: None,
                body,
            })
            .collect(),
        signatures: vec![],
    };
    let meta = TransactionMeta {
        tx_changes: vec![],
        operations: results.iter().map(|_| OperationMeta::new(vec![])).collect(),
    };
    let result = TransactionResult {
        fee_charged: 100,
        code,
        results: results.into_iter().map(OperationResult::Inner).collect(),
    };
    SourceTransaction::new(envelope, result, meta)
}

pub fn payment(to: &str, amount: i64) -> (OperationBody, OperationResultTr) {
    (
        OperationBody::Payment(PaymentOp {
            destination: account(to),
            asset: Asset::Native,
            amount,
        }),
        OperationResultTr::Payment(OpResult::Success(())),
    )
}

pub fn failed_payment(to: &str, amount: i64) -> (OperationBody, OperationResultTr) {
    let (body, _) = payment(to, amount);
    (body, OperationResultTr::Payment(OpResult::Failure(-1)))
}

pub fn create_account(to: &str, starting_balance: i64) -> (OperationBody, OperationResultTr) {
    (
        OperationBody::CreateAccount(CreateAccountOp {
            destination: account(to),
            starting_balance,
        }),
        OperationResultTr::CreateAccount(OpResult::Success(())),
    )
}

/// Genesis, then a ledger 2 holding three successful transactions, then
/// empty ledgers up to `last`.
pub fn scenario(last: u32) -> Arc<InMemoryLedgerSource> {
    let source = Arc::new(InMemoryLedgerSource::new());
    source.append_ledger(CLOSE_TIME, vec![]).unwrap();
    source
        .append_ledger(
            CLOSE_TIME + 5,
            vec![
                transaction(
                    "root",
                    2,
                    vec![create_account("alice", 1_000_000_000)],
                    TransactionResultCode::Success,
                ),
                transaction(
                    "root",
                    3,
                    vec![payment("alice", 50_000_000)],
                    TransactionResultCode::Success,
                ),
                transaction(
                    "alice",
                    4,
                    vec![payment("root", 10_000_000)],
                    TransactionResultCode::Success,
                ),
            ],
        )
        .unwrap();
    for sequence in 3..=last {
        source
            .append_ledger(CLOSE_TIME + u64::from(sequence) * 5, vec![])
            .unwrap();
    }
    source
}

/// Route ingestion logs to the test harness's captured output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn system_with(
    source: Arc<dyn LedgerSource>,
    store: Arc<InMemoryHistoryStore>,
    reporter: Arc<dyn CursorReporter>,
    config: IngestConfig,
) -> System {
    init_tracing();
    System::new(source, store, reporter, config)
}

pub fn system(source: Arc<dyn LedgerSource>, store: Arc<InMemoryHistoryStore>) -> System {
    system_with(source, store, Arc::new(NoopReporter), IngestConfig::default())
}
