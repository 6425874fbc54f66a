use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use strand_history::{
    AccountRef, BatchInsertBuilder, EffectRow, HistoryStore, LedgerRow, OperationParticipantRow,
    OperationRow, Row, StoreError, Table, TradeRow, TransactionParticipantRow, TransactionRow,
};
use strand_source::Transaction;
use strand_types::{codec, AccountId, LedgerHeader, Memo, OperationType};
use tracing::{debug, trace, warn};

use crate::effects::{EffectSink, EffectType};
use crate::error::{IngestError, IngestResult};
use crate::trades::closed_at;

/// Version stamped on every ledger row this importer writes. Ledgers
/// written by an older version are picked up by `reingest_outdated`.
pub const CURRENT_VERSION: i32 = 16;

/// Per-ledger totals stored on the ledger row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub transactions: usize,
    pub successful_transactions: usize,
    pub failed_transactions: usize,
    pub operations: usize,
}

/// Buffered writer for derived history rows.
///
/// Rows accumulate in one builder per table and reach the store together on
/// [`Ingestion::flush`] or [`Ingestion::close`], inside the store
/// transaction opened by [`Ingestion::start`]. Account columns are written
/// as addresses and resolved to participant ids at flush time.
pub struct Ingestion {
    store: Arc<dyn HistoryStore>,
    ledgers: BatchInsertBuilder<LedgerRow>,
    transactions: BatchInsertBuilder<TransactionRow>,
    transaction_participants: BatchInsertBuilder<TransactionParticipantRow>,
    operations: BatchInsertBuilder<OperationRow>,
    operation_participants: BatchInsertBuilder<OperationParticipantRow>,
    effects: BatchInsertBuilder<EffectRow>,
    trades: BatchInsertBuilder<TradeRow>,
    /// Participant ids seen by this writer.
    account_ids: HashMap<String, i64>,
    open: bool,
}

impl Ingestion {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            ledgers: BatchInsertBuilder::new(),
            transactions: BatchInsertBuilder::new(),
            transaction_participants: BatchInsertBuilder::new(),
            operations: BatchInsertBuilder::new(),
            operation_participants: BatchInsertBuilder::new(),
            effects: BatchInsertBuilder::new(),
            trades: BatchInsertBuilder::new(),
            account_ids: HashMap::new(),
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open a store transaction.
    pub fn start(&mut self) -> IngestResult<()> {
        self.store.begin()?;
        self.open = true;
        Ok(())
    }

    /// Write buffered rows, commit, and open the next transaction.
    pub fn flush(&mut self) -> IngestResult<()> {
        self.commit()?;
        self.start()
    }

    /// Write buffered rows and commit.
    pub fn close(&mut self) -> IngestResult<()> {
        self.commit()
    }

    /// Drop buffered rows and roll back the store transaction.
    ///
    /// Cached participant ids are dropped too: accounts created inside the
    /// transaction are gone.
    pub fn rollback(&mut self) -> IngestResult<()> {
        self.clear_buffers();
        self.account_ids.clear();
        self.open = false;
        self.store.rollback()?;
        Ok(())
    }

    /// Rows buffered since the last flush.
    pub fn pending_rows(&self) -> usize {
        self.ledgers.len()
            + self.transactions.len()
            + self.transaction_participants.len()
            + self.operations.len()
            + self.operation_participants.len()
            + self.effects.len()
            + self.trades.len()
    }

    /// Delete every derived row with an id in `[start, end)`.
    pub fn clear(&mut self, start: i64, end: i64) -> IngestResult<()> {
        self.require_open()?;
        let mut removed = 0;
        for table in Table::CLEAR_ORDER {
            removed += self.store.delete_range(table, start, end)?;
        }
        debug!(start, end, removed, "ingest: range cleared");
        Ok(())
    }

    /// Delete every derived row and every participant account.
    pub fn clear_all(&mut self) -> IngestResult<()> {
        self.require_open()?;
        self.store.truncate(&Table::CLEAR_ORDER)?;
        self.store.truncate_accounts()?;
        self.account_ids.clear();
        debug!("ingest: history cleared");
        Ok(())
    }

    pub fn ledger(
        &mut self,
        id: i64,
        header: &LedgerHeader,
        counts: LedgerCounts,
    ) -> IngestResult<()> {
        self.require_open()?;
        self.ledgers.add(LedgerRow {
            id,
            sequence: header.sequence,
            importer_version: CURRENT_VERSION,
            ledger_hash: header.hash.to_hex(),
            previous_ledger_hash: (header.sequence > 1).then(|| header.previous_hash.to_hex()),
            total_coins: header.total_coins,
            fee_pool: header.fee_pool,
            base_fee: header.base_fee,
            base_reserve: header.base_reserve,
            max_tx_set_size: header.max_tx_set_size,
            closed_at: closed_at(header.close_time)?,
            transaction_count: counts.transactions as i32,
            successful_transaction_count: counts.successful_transactions as i32,
            failed_transaction_count: counts.failed_transactions as i32,
            operation_count: counts.operations as i32,
            protocol_version: header.protocol_version,
            ledger_header: codec::encode_base64(header)?,
        });
        Ok(())
    }

    pub fn transaction(&mut self, id: i64, tx: &Transaction) -> IngestResult<()> {
        self.require_open()?;
        let envelope = &tx.envelope;
        let (memo_type, memo) = memo_columns(&envelope.memo);
        self.transactions.add(TransactionRow {
            id,
            transaction_hash: tx.hash.to_hex(),
            ledger_sequence: tx.ledger_sequence,
            application_order: tx.application_order,
            account: envelope.source_account.address(),
            account_sequence: envelope.seq_num,
            max_fee: envelope.fee,
            fee_charged: tx.result.fee_charged,
            operation_count: tx.operation_count() as i32,
            tx_envelope: codec::encode_base64(envelope)?,
            tx_result: codec::encode_base64(&tx.result)?,
            tx_meta: codec::encode_base64(&tx.meta)?,
            tx_fee_meta: codec::encode_base64(&tx.fee_changes)?,
            signatures: envelope
                .signatures
                .iter()
                .map(|s| base64_encode(s))
                .collect(),
            time_bounds: envelope.time_bounds.map(|tb| {
                if tb.max_time == 0 {
                    format!("[{},)", tb.min_time)
                } else {
                    format!("[{},{})", tb.min_time, tb.max_time)
                }
            }),
            memo_type: memo_type.to_string(),
            memo,
            successful: tx.is_successful(),
        });
        Ok(())
    }

    pub fn operation(
        &mut self,
        id: i64,
        transaction_id: i64,
        application_order: u32,
        source: &AccountId,
        operation_type: OperationType,
        details: Value,
    ) -> IngestResult<()> {
        self.require_open()?;
        self.operations.add(OperationRow {
            id,
            transaction_id,
            application_order,
            source_account: source.address(),
            operation_type: operation_type.code(),
            details,
        });
        Ok(())
    }

    pub fn operation_participants(
        &mut self,
        operation_id: i64,
        accounts: &[AccountId],
    ) -> IngestResult<()> {
        self.require_open()?;
        for account in accounts {
            self.operation_participants.add(OperationParticipantRow {
                history_operation_id: operation_id,
                history_account_id: AccountRef::Address(account.address()),
            });
        }
        Ok(())
    }

    pub fn transaction_participants(
        &mut self,
        transaction_id: i64,
        accounts: &[AccountId],
    ) -> IngestResult<()> {
        self.require_open()?;
        for account in accounts {
            self.transaction_participants.add(TransactionParticipantRow {
                history_transaction_id: transaction_id,
                history_account_id: AccountRef::Address(account.address()),
            });
        }
        Ok(())
    }

    pub fn trade(&mut self, row: TradeRow) -> IngestResult<()> {
        self.require_open()?;
        self.trades.add(row);
        Ok(())
    }

    /// Participant id of `address`, creating the account when the store
    /// does not know it yet.
    pub fn participant_id(&mut self, address: &str) -> IngestResult<i64> {
        let ids = self.participant_ids(&[address.to_string()])?;
        ids.get(address)
            .copied()
            .ok_or_else(|| IngestError::Store(StoreError::UnresolvedAccount {
                table: Table::TransactionParticipants,
                address: address.to_string(),
            }))
    }

    /// Participant ids for `addresses`: cached ids first, then existing
    /// store rows, then newly created accounts.
    pub fn participant_ids(&mut self, addresses: &[String]) -> IngestResult<HashMap<String, i64>> {
        let mut missing: Vec<String> = addresses
            .iter()
            .filter(|a| !self.account_ids.contains_key(a.as_str()))
            .cloned()
            .collect();
        missing.sort();
        missing.dedup();

        if !missing.is_empty() {
            for row in self.store.accounts_by_addresses(&missing)? {
                self.account_ids.insert(row.address, row.id);
            }
            let absent: Vec<String> = missing
                .into_iter()
                .filter(|a| !self.account_ids.contains_key(a.as_str()))
                .collect();
            if !absent.is_empty() {
                trace!(count = absent.len(), "ingest: creating participant accounts");
                for row in self.store.create_accounts(&absent)? {
                    self.account_ids.insert(row.address, row.id);
                }
            }
        }

        Ok(addresses
            .iter()
            .filter_map(|a| self.account_ids.get(a).map(|id| (a.clone(), *id)))
            .collect())
    }

    fn commit(&mut self) -> IngestResult<()> {
        self.require_open()?;
        self.write_batches()?;
        self.store.commit()?;
        self.open = false;
        Ok(())
    }

    fn write_batches(&mut self) -> IngestResult<()> {
        let mut addresses = Vec::new();
        addresses.extend(self.transaction_participants.addresses());
        addresses.extend(self.operation_participants.addresses());
        addresses.extend(self.effects.addresses());
        addresses.extend(self.trades.addresses());
        let ids = self.participant_ids(&addresses)?;

        let rows = self.pending_rows();
        write(&*self.store, &mut self.ledgers, &ids)?;
        write(&*self.store, &mut self.transactions, &ids)?;
        write(&*self.store, &mut self.transaction_participants, &ids)?;
        write(&*self.store, &mut self.operations, &ids)?;
        write(&*self.store, &mut self.operation_participants, &ids)?;
        write(&*self.store, &mut self.effects, &ids)?;
        write(&*self.store, &mut self.trades, &ids)?;
        trace!(rows, "ingest: batches written");
        Ok(())
    }

    fn clear_buffers(&mut self) {
        self.ledgers.clear();
        self.transactions.clear();
        self.transaction_participants.clear();
        self.operations.clear();
        self.operation_participants.clear();
        self.effects.clear();
        self.trades.clear();
    }

    fn require_open(&self) -> IngestResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(StoreError::NoTransaction.into())
        }
    }
}

impl Drop for Ingestion {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.store.rollback() {
                warn!(error = %e, "ingest: rollback of abandoned transaction failed");
            }
        }
    }
}

fn write<R: Row>(
    store: &dyn HistoryStore,
    builder: &mut BatchInsertBuilder<R>,
    ids: &HashMap<String, i64>,
) -> IngestResult<()> {
    if builder.is_empty() {
        return Ok(());
    }
    builder.resolve(ids)?;
    store.insert_batch(builder.take_batch()?)?;
    Ok(())
}

impl EffectSink for Ingestion {
    fn effect(
        &mut self,
        account: &AccountId,
        operation_id: i64,
        order: u32,
        effect: EffectType,
        details: Value,
    ) -> IngestResult<()> {
        self.require_open()?;
        self.effects.add(EffectRow {
            history_account_id: AccountRef::Address(account.address()),
            history_operation_id: operation_id,
            order,
            effect_type: effect.code(),
            details,
        });
        Ok(())
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn memo_columns(memo: &Memo) -> (&'static str, Option<String>) {
    let value = match memo {
        Memo::None => None,
        Memo::Text(text) => Some(text.clone()),
        Memo::Id(id) => Some(id.to_string()),
        Memo::Hash(hash) | Memo::Return(hash) => Some(base64_encode(hash.as_bytes())),
    };
    (memo.type_name(), value)
}
