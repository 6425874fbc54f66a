use strand_types::Toid;

use crate::error::StoreResult;
use crate::rows::{
    EffectRow, LedgerRow, OperationParticipantRow, OperationRow, TradeRow,
    TransactionParticipantRow, TransactionRow,
};
use crate::schema::Row;
use crate::traits::HistoryStore;

/// Typed read helpers over any [`HistoryStore`].
pub trait HistoryQueries {
    /// Rows of `R`'s table with ids in `[start, end)`.
    fn rows<R: Row>(&self, start: i64, end: i64) -> StoreResult<Vec<R>>;

    fn ledgers(&self) -> StoreResult<Vec<LedgerRow>> {
        self.rows(0, i64::MAX)
    }

    fn ledger(&self, sequence: u32) -> StoreResult<Option<LedgerRow>> {
        let (start, end) = Toid::ledger_range(sequence);
        Ok(self.rows::<LedgerRow>(start, end)?.into_iter().next())
    }

    /// Newest ingested ledger.
    fn latest_ledger(&self) -> StoreResult<Option<u32>> {
        Ok(self.ledgers()?.last().map(|l| l.sequence))
    }

    /// Oldest ingested ledger.
    fn elder_ledger(&self) -> StoreResult<Option<u32>> {
        Ok(self.ledgers()?.first().map(|l| l.sequence))
    }

    fn transactions_for_ledger(&self, sequence: u32) -> StoreResult<Vec<TransactionRow>> {
        let (start, end) = Toid::ledger_range(sequence);
        self.rows(start, end)
    }

    /// Operations of a ledger in ascending id order.
    fn operations_for_ledger(&self, sequence: u32) -> StoreResult<Vec<OperationRow>> {
        let (start, end) = Toid::ledger_range(sequence);
        self.rows(start, end)
    }

    fn effects_for_ledger(&self, sequence: u32) -> StoreResult<Vec<EffectRow>> {
        let (start, end) = Toid::ledger_range(sequence);
        self.rows(start, end)
    }

    fn effects_for_operation(&self, operation_id: i64) -> StoreResult<Vec<EffectRow>> {
        self.rows(operation_id, operation_id + 1)
    }

    fn trades_for_ledger(&self, sequence: u32) -> StoreResult<Vec<TradeRow>> {
        let (start, end) = Toid::ledger_range(sequence);
        self.rows(start, end)
    }

    fn operation_participants(&self, operation_id: i64) -> StoreResult<Vec<OperationParticipantRow>> {
        self.rows(operation_id, operation_id + 1)
    }

    fn transaction_participants(
        &self,
        transaction_id: i64,
    ) -> StoreResult<Vec<TransactionParticipantRow>> {
        self.rows(transaction_id, transaction_id + 1)
    }

    /// Up to `limit` ledger sequences written by an importer older than
    /// `current_version`, oldest first.
    fn outdated_ledgers(&self, current_version: i32, limit: usize) -> StoreResult<Vec<u32>> {
        Ok(self
            .ledgers()?
            .into_iter()
            .filter(|l| l.importer_version < current_version)
            .map(|l| l.sequence)
            .take(limit)
            .collect())
    }
}

impl<S: HistoryStore + ?Sized> HistoryQueries for S {
    fn rows<R: Row>(&self, start: i64, end: i64) -> StoreResult<Vec<R>> {
        self.select_range(R::TABLE, start, end)?
            .iter()
            .map(R::from_record)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryHistoryStore;
    use crate::schema::BatchInsertBuilder;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn ledger(sequence: u32, importer_version: i32) -> LedgerRow {
        LedgerRow {
            id: Toid::ledger(sequence).to_i64(),
            sequence,
            importer_version,
            ledger_hash: format!("{sequence:064x}"),
            previous_ledger_hash: None,
            total_coins: 0,
            fee_pool: 0,
            base_fee: 100,
            base_reserve: 1,
            max_tx_set_size: 1,
            closed_at: Utc.timestamp_opt(sequence as i64, 0).unwrap(),
            transaction_count: 0,
            successful_transaction_count: 0,
            failed_transaction_count: 0,
            operation_count: 0,
            protocol_version: 12,
            ledger_header: String::new(),
        }
    }

    fn insert<R: Row>(store: &InMemoryHistoryStore, rows: Vec<R>) {
        let mut builder = BatchInsertBuilder::new();
        for row in rows {
            builder.add(row);
        }
        store.insert_batch(builder.take_batch().unwrap()).unwrap();
    }

    #[test]
    fn ledger_bounds() {
        let store = InMemoryHistoryStore::new();
        assert_eq!(store.latest_ledger().unwrap(), None);
        insert(&store, vec![ledger(4, 1), ledger(2, 1), ledger(3, 1)]);
        assert_eq!(store.elder_ledger().unwrap(), Some(2));
        assert_eq!(store.latest_ledger().unwrap(), Some(4));
        assert_eq!(store.ledger(3).unwrap().unwrap().sequence, 3);
        assert!(store.ledger(9).unwrap().is_none());
    }

    #[test]
    fn outdated_ledgers_are_oldest_first() {
        let store = InMemoryHistoryStore::new();
        insert(
            &store,
            vec![ledger(2, 1), ledger(3, 2), ledger(4, 1), ledger(5, 1)],
        );
        assert_eq!(store.outdated_ledgers(2, 10).unwrap(), vec![2, 4, 5]);
        assert_eq!(store.outdated_ledgers(2, 2).unwrap(), vec![2, 4]);
        assert!(store.outdated_ledgers(1, 10).unwrap().is_empty());
    }

    #[test]
    fn operations_for_ledger_are_scoped() {
        let store = InMemoryHistoryStore::new();
        let op = |l, t, o| OperationRow {
            id: Toid::new(l, t, o).to_i64(),
            transaction_id: Toid::new(l, t, 0).to_i64(),
            application_order: o,
            source_account: "G".into(),
            operation_type: 1,
            details: json!({}),
        };
        insert(&store, vec![op(3, 1, 2), op(2, 1, 1), op(3, 1, 1), op(4, 1, 1)]);
        let ops = store.operations_for_ledger(3).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(ops[0].id < ops[1].id);
    }
}
