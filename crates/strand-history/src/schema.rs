//! Table and column descriptors for history rows.
//!
//! Each row type declares its columns once, as an ordered list of
//! `(name, accessor)` pairs. Batches are built from these descriptors and
//! rows are read back by pairing stored values with the same names.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Table {
    Ledgers,
    Transactions,
    TransactionParticipants,
    Operations,
    OperationParticipants,
    Effects,
    Trades,
}

impl Table {
    /// Order in which a range is cleared, dependents first.
    pub const CLEAR_ORDER: [Table; 7] = [
        Table::Effects,
        Table::OperationParticipants,
        Table::Operations,
        Table::TransactionParticipants,
        Table::Transactions,
        Table::Ledgers,
        Table::Trades,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Ledgers => "history_ledgers",
            Table::Transactions => "history_transactions",
            Table::TransactionParticipants => "history_transaction_participants",
            Table::Operations => "history_operations",
            Table::OperationParticipants => "history_operation_participants",
            Table::Effects => "history_effects",
            Table::Trades => "history_trades",
        }
    }

    /// The packed-id column used for range deletes.
    pub fn id_column(self) -> &'static str {
        match self {
            Table::Ledgers | Table::Transactions | Table::Operations => "id",
            Table::TransactionParticipants => "history_transaction_id",
            Table::OperationParticipants | Table::Effects | Table::Trades => {
                "history_operation_id"
            }
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One column of a row type.
pub struct Column<R> {
    pub name: &'static str,
    pub get: fn(&R) -> Value,
}

/// A reference to a participant account: an address until the batch is
/// flushed, the surrogate id afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountRef {
    Id(i64),
    Address(String),
}

impl AccountRef {
    pub fn id(&self) -> Option<i64> {
        match self {
            AccountRef::Id(id) => Some(*id),
            AccountRef::Address(_) => None,
        }
    }
}

impl From<&AccountRef> for Value {
    fn from(account: &AccountRef) -> Self {
        match account {
            AccountRef::Id(id) => Value::from(*id),
            AccountRef::Address(address) => Value::from(address.as_str()),
        }
    }
}

/// Stored values of one row, aligned with its table's columns.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Value of the table's id column.
    pub key: i64,
    pub values: Vec<Value>,
}

/// A row of a history table.
pub trait Row: Clone + Serialize + DeserializeOwned + Send + 'static {
    const TABLE: Table;
    const COLUMNS: &'static [Column<Self>];

    /// Value of the table's id column.
    fn key(&self) -> i64;

    /// Account columns that may still hold addresses.
    fn accounts_mut(&mut self) -> Vec<&mut AccountRef> {
        Vec::new()
    }

    fn column_names() -> Vec<&'static str> {
        Self::COLUMNS.iter().map(|c| c.name).collect()
    }

    fn to_record(&self) -> Record {
        Record {
            key: self.key(),
            values: Self::COLUMNS.iter().map(|c| (c.get)(self)).collect(),
        }
    }

    fn from_record(record: &Record) -> StoreResult<Self> {
        if record.values.len() != Self::COLUMNS.len() {
            return Err(StoreError::Schema {
                table: Self::TABLE,
                reason: format!(
                    "expected {} values, got {}",
                    Self::COLUMNS.len(),
                    record.values.len()
                ),
            });
        }
        let map: Map<String, Value> = Self::COLUMNS
            .iter()
            .zip(&record.values)
            .map(|(c, v)| (c.name.to_string(), v.clone()))
            .collect();
        serde_json::from_value(Value::Object(map))
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", Self::TABLE)))
    }
}

/// Rows bound for one table, written in a single store call.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertBatch {
    pub table: Table,
    pub columns: Vec<&'static str>,
    pub records: Vec<Record>,
}

/// Accumulates rows of one type until flush.
pub struct BatchInsertBuilder<R: Row> {
    rows: Vec<R>,
}

impl<R: Row> Default for BatchInsertBuilder<R> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<R: Row> BatchInsertBuilder<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, row: R) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Addresses that still need a participant id.
    pub fn addresses(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        for row in &mut self.rows {
            for account in row.accounts_mut() {
                if let AccountRef::Address(address) = account {
                    out.push(address.clone());
                }
            }
        }
        out
    }

    /// Replace addresses with ids from `ids`.
    pub fn resolve(&mut self, ids: &HashMap<String, i64>) -> StoreResult<()> {
        for row in &mut self.rows {
            for account in row.accounts_mut() {
                if let AccountRef::Address(address) = account {
                    let id = ids.get(address.as_str()).ok_or_else(|| {
                        StoreError::UnresolvedAccount {
                            table: R::TABLE,
                            address: address.clone(),
                        }
                    })?;
                    *account = AccountRef::Id(*id);
                }
            }
        }
        Ok(())
    }

    /// Drain the builder into a batch. Fails if any account is unresolved.
    pub fn take_batch(&mut self) -> StoreResult<InsertBatch> {
        let rows = std::mem::take(&mut self.rows);
        let mut records = Vec::with_capacity(rows.len());
        for mut row in rows {
            let unresolved = row.accounts_mut().into_iter().find_map(|a| match a {
                AccountRef::Address(address) => Some(address.clone()),
                AccountRef::Id(_) => None,
            });
            if let Some(address) = unresolved {
                return Err(StoreError::UnresolvedAccount {
                    table: R::TABLE,
                    address,
                });
            }
            records.push(row.to_record());
        }
        Ok(InsertBatch {
            table: R::TABLE,
            columns: R::column_names(),
            records,
        })
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
