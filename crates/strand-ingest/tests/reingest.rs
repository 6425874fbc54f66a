//! Reingestion, trimming and history rebasing.

mod common;

use std::sync::Arc;

use common::*;
use strand_history::{
    BatchInsertBuilder, HistoryQueries, HistoryStore, InMemoryHistoryStore, LedgerRow, Table,
};
use strand_ingest::{IngestConfig, IngestError, TickOutcome, CURRENT_VERSION};
use strand_source::NoopReporter;
use strand_types::Toid;

fn snapshot(store: &InMemoryHistoryStore) -> Vec<Vec<strand_history::Record>> {
    Table::CLEAR_ORDER
        .iter()
        .map(|table| store.committed_rows(*table))
        .collect()
}

#[test]
fn reingest_reproduces_identical_rows() {
    let store = Arc::new(InMemoryHistoryStore::new());
    let system = system(scenario(10), store.clone());
    system.tick().unwrap();
    let before = snapshot(&store);
    let accounts = store.account_count();

    let stats = system.reingest_range(2, 10).unwrap();
    assert_eq!(stats.ledgers, 9);
    assert_eq!(snapshot(&store), before);
    assert_eq!(store.account_count(), accounts);
}

#[test]
fn reingest_single_replaces_one_ledger() {
    let store = Arc::new(InMemoryHistoryStore::new());
    let system = system(scenario(4), store.clone());
    system.tick().unwrap();

    system.reingest_single(2).unwrap();
    assert_eq!(store.transactions_for_ledger(2).unwrap().len(), 3);
    assert_eq!(store.effects_for_ledger(2).unwrap().len(), 7);
    assert_eq!(store.latest_ledger().unwrap(), Some(4));
}

#[test]
fn reingest_rejects_bad_ranges() {
    let system = system(scenario(4), Arc::new(InMemoryHistoryStore::new()));
    assert!(matches!(
        system.reingest_range(4, 2),
        Err(IngestError::InvalidRange { start: 4, end: 2 })
    ));
    assert!(matches!(
        system.reingest_single(0),
        Err(IngestError::InvalidRange { .. })
    ));
}

#[test]
fn reingest_of_missing_ledgers_fails() {
    let store = Arc::new(InMemoryHistoryStore::new());
    let system = system(scenario(4), store.clone());
    let err = system.reingest_range(3, 8).unwrap_err();
    assert!(matches!(err, IngestError::MissingLedger { sequence: 5 }));
    // Ledgers before the gap stay committed.
    assert_eq!(store.latest_ledger().unwrap(), Some(4));
    assert!(!system.is_importing());
}

#[test]
fn trim_removes_ledgers_the_source_pruned() {
    let source = scenario(10);
    let store = Arc::new(InMemoryHistoryStore::new());
    let system = system(source.clone(), store.clone());
    system.tick().unwrap();

    source.prune_before(6).unwrap();
    system.trim_abandoned().unwrap();

    assert_eq!(store.elder_ledger().unwrap(), Some(6));
    assert_eq!(store.latest_ledger().unwrap(), Some(10));
    assert!(store.transactions_for_ledger(2).unwrap().is_empty());
    assert!(store.effects_for_ledger(2).unwrap().is_empty());
    assert_eq!(system.ledger_state().history_elder, Some(6));
}

#[test]
fn reingest_all_covers_the_source() {
    let source = scenario(6);
    let store = Arc::new(InMemoryHistoryStore::new());
    let system = system(source.clone(), store.clone());
    system.tick().unwrap();
    source.prune_before(3).unwrap();

    let stats = system.reingest_all().unwrap();
    assert_eq!(stats.ledgers, 4);
    assert_eq!(store.elder_ledger().unwrap(), Some(3));
    assert_eq!(store.latest_ledger().unwrap(), Some(6));
}

#[test]
fn outdated_ledgers_are_reingested() {
    let store = Arc::new(InMemoryHistoryStore::new());
    let config = IngestConfig {
        outdated_batch_size: 1,
        ..IngestConfig::default()
    };
    let system = system_with(scenario(8), store.clone(), Arc::new(NoopReporter), config);
    system.tick().unwrap();

    let mut builder = BatchInsertBuilder::<LedgerRow>::new();
    for sequence in [3, 4, 7] {
        let mut row = store.ledger(sequence).unwrap().unwrap();
        row.importer_version = CURRENT_VERSION - 1;
        builder.add(row);
    }
    store.begin().unwrap();
    for sequence in [3, 4, 7] {
        let (start, end) = Toid::ledger_range(sequence);
        store.delete_range(Table::Ledgers, start, end).unwrap();
    }
    store.insert_batch(builder.take_batch().unwrap()).unwrap();
    store.commit().unwrap();
    assert_eq!(store.outdated_ledgers(CURRENT_VERSION, 10).unwrap(), vec![3, 4, 7]);

    assert_eq!(system.reingest_outdated().unwrap(), 3);
    assert!(store.outdated_ledgers(CURRENT_VERSION, 10).unwrap().is_empty());
    assert_eq!(store.ledgers().unwrap().len(), 7);
}

#[test]
fn retention_bounds_the_first_range() {
    let store = Arc::new(InMemoryHistoryStore::new());
    let config = IngestConfig {
        history_retention_count: 3,
        ..IngestConfig::default()
    };
    let system = system_with(scenario(10), store.clone(), Arc::new(NoopReporter), config);

    assert!(matches!(
        system.tick().unwrap(),
        TickOutcome::Ingested { first: 8, last: 10, .. }
    ));
    assert_eq!(store.elder_ledger().unwrap(), Some(8));
}

#[test]
fn rebase_restarts_history() {
    let store = Arc::new(InMemoryHistoryStore::new());
    let system = system(scenario(10), store.clone());
    system.tick().unwrap();

    system.rebase_history(5).unwrap();
    assert_eq!(store.elder_ledger().unwrap(), Some(5));
    assert_eq!(store.latest_ledger().unwrap(), Some(5));
    assert_eq!(store.account_count(), 0);

    system.clear_all().unwrap();
    assert_eq!(store.latest_ledger().unwrap(), None);
    for table in Table::CLEAR_ORDER {
        assert_eq!(store.row_count(table), 0, "{table} not cleared");
    }
}
