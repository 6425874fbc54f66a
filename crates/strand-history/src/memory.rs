use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::rows::AccountRow;
use crate::schema::{InsertBatch, Record, Table};
use crate::traits::HistoryStore;

#[derive(Clone, Default)]
struct Tables {
    rows: BTreeMap<Table, Vec<Record>>,
    columns: BTreeMap<Table, Vec<&'static str>>,
    accounts: BTreeMap<String, i64>,
    last_account_id: i64,
}

#[derive(Default)]
struct StoreState {
    committed: Tables,
    /// Working copy of the open transaction.
    pending: Option<Tables>,
    unavailable: bool,
    failing_table: Option<Table>,
}

impl StoreState {
    fn working(&mut self) -> &mut Tables {
        match &mut self.pending {
            Some(tables) => tables,
            None => &mut self.committed,
        }
    }

    fn visible(&self) -> &Tables {
        self.pending.as_ref().unwrap_or(&self.committed)
    }
}

/// In-memory history store for tests and embedding.
///
/// One transaction may be open at a time. Reads see the open transaction's
/// writes; other readers of the same store see them too, since there is a
/// single working copy.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    inner: RwLock<StoreState>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows of a table, in insertion order.
    pub fn committed_rows(&self, table: Table) -> Vec<Record> {
        self.inner
            .read()
            .expect("lock poisoned")
            .committed
            .rows
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: Table) -> usize {
        self.inner
            .read()
            .expect("lock poisoned")
            .visible()
            .rows
            .get(&table)
            .map_or(0, Vec::len)
    }

    pub fn account_count(&self) -> usize {
        self.inner
            .read()
            .expect("lock poisoned")
            .visible()
            .accounts
            .len()
    }

    pub fn in_transaction(&self) -> bool {
        self.inner.read().expect("lock poisoned").pending.is_some()
    }

    /// Make every call fail, simulating a lost connection.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().expect("lock poisoned").unavailable = unavailable;
    }

    /// Make inserts into `table` fail.
    pub fn fail_inserts_into(&self, table: Option<Table>) {
        self.inner.write().expect("lock poisoned").failing_table = table;
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        let state = self
            .inner
            .read()
            .map_err(|_| StoreError::Unavailable("history read lock poisoned".into()))?;
        if state.unavailable {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(state)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        let state = self
            .inner
            .write()
            .map_err(|_| StoreError::Unavailable("history write lock poisoned".into()))?;
        if state.unavailable {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(state)
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn begin(&self) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.pending.is_some() {
            return Err(StoreError::TransactionInProgress);
        }
        state.pending = Some(state.committed.clone());
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut state = self.write()?;
        let pending = state.pending.take().ok_or(StoreError::NoTransaction)?;
        state.committed = pending;
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        let mut state = self
            .inner
            .write()
            .map_err(|_| StoreError::Unavailable("history write lock poisoned".into()))?;
        state.pending = None;
        Ok(())
    }

    fn insert_batch(&self, batch: InsertBatch) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.failing_table == Some(batch.table) {
            return Err(StoreError::Unavailable(format!(
                "insert into {} failed",
                batch.table
            )));
        }
        if batch.records.is_empty() {
            return Ok(());
        }
        let tables = state.working();
        let columns = tables
            .columns
            .entry(batch.table)
            .or_insert_with(|| batch.columns.clone());
        if *columns != batch.columns {
            return Err(StoreError::Schema {
                table: batch.table,
                reason: format!("columns {:?} do not match {:?}", batch.columns, columns),
            });
        }
        if let Some(bad) = batch
            .records
            .iter()
            .find(|r| r.values.len() != batch.columns.len())
        {
            return Err(StoreError::Schema {
                table: batch.table,
                reason: format!(
                    "row {} has {} values for {} columns",
                    bad.key,
                    bad.values.len(),
                    batch.columns.len()
                ),
            });
        }
        trace!(table = %batch.table, rows = batch.records.len(), "history: insert");
        tables
            .rows
            .entry(batch.table)
            .or_default()
            .extend(batch.records);
        Ok(())
    }

    fn delete_range(&self, table: Table, start: i64, end: i64) -> StoreResult<u64> {
        let mut state = self.write()?;
        let Some(rows) = state.working().rows.get_mut(&table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| r.key < start || r.key >= end);
        Ok((before - rows.len()) as u64)
    }

    fn truncate(&self, tables: &[Table]) -> StoreResult<()> {
        let mut state = self.write()?;
        let working = state.working();
        for table in tables {
            working.rows.remove(table);
        }
        Ok(())
    }

    fn truncate_accounts(&self) -> StoreResult<()> {
        let mut state = self.write()?;
        state.working().accounts.clear();
        Ok(())
    }

    fn select_range(&self, table: Table, start: i64, end: i64) -> StoreResult<Vec<Record>> {
        let state = self.read()?;
        let mut out: Vec<Record> = state
            .visible()
            .rows
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.key >= start && r.key < end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by_key(|r| r.key);
        Ok(out)
    }

    fn accounts_by_addresses(&self, addresses: &[String]) -> StoreResult<Vec<AccountRow>> {
        let state = self.read()?;
        let accounts = &state.visible().accounts;
        Ok(addresses
            .iter()
            .filter_map(|address| {
                accounts.get(address).map(|id| AccountRow {
                    id: *id,
                    address: address.clone(),
                })
            })
            .collect())
    }

    fn create_accounts(&self, addresses: &[String]) -> StoreResult<Vec<AccountRow>> {
        let mut state = self.write()?;
        let tables = state.working();
        let mut out = Vec::with_capacity(addresses.len());
        for address in addresses {
            let id = match tables.accounts.get(address) {
                Some(id) => *id,
                None => {
                    tables.last_account_id += 1;
                    let id = tables.last_account_id;
                    tables.accounts.insert(address.clone(), id);
                    id
                }
            };
            out.push(AccountRow {
                id,
                address: address.clone(),
            });
        }
        Ok(out)
    }
}
