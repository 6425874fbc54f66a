use crate::error::StoreResult;
use crate::rows::AccountRow;
use crate::schema::{InsertBatch, Record, Table};

/// Read/write boundary of the derived history database.
///
/// All implementations must satisfy these invariants:
/// - Writes made between `begin` and `commit` become visible atomically;
///   `rollback` discards them.
/// - Derived rows are only ever inserted or range-deleted, never updated.
/// - `create_accounts` is idempotent per address: the store's uniqueness
///   constraint, not any caller-side cache, decides an address's id.
pub trait HistoryStore: Send + Sync {
    fn begin(&self) -> StoreResult<()>;

    fn commit(&self) -> StoreResult<()>;

    /// Discard the open transaction. A no-op when none is open.
    fn rollback(&self) -> StoreResult<()>;

    fn insert_batch(&self, batch: InsertBatch) -> StoreResult<()>;

    /// Delete rows whose id column lies in `[start, end)`. Returns the number
    /// of rows removed.
    fn delete_range(&self, table: Table, start: i64, end: i64) -> StoreResult<u64>;

    /// Remove every row of the given tables.
    fn truncate(&self, tables: &[Table]) -> StoreResult<()>;

    /// Remove every participant account.
    fn truncate_accounts(&self) -> StoreResult<()>;

    /// Rows whose id column lies in `[start, end)`, ordered by id then
    /// insertion order.
    fn select_range(&self, table: Table, start: i64, end: i64) -> StoreResult<Vec<Record>>;

    fn accounts_by_addresses(&self, addresses: &[String]) -> StoreResult<Vec<AccountRow>>;

    /// Insert accounts for `addresses`, returning the row of each. Addresses
    /// that already exist keep their id.
    fn create_accounts(&self, addresses: &[String]) -> StoreResult<Vec<AccountRow>>;
}
