use serde::{Deserialize, Serialize};

use crate::entry::{Change, LedgerEntryChange, LedgerKey};

/// Ledger-state changes caused by applying a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMeta {
    /// Changes applied before operations run (sequence number bump).
    pub tx_changes: Vec<LedgerEntryChange>,
    /// One entry per operation, in application order.
    pub operations: Vec<OperationMeta>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMeta {
    pub changes: Vec<LedgerEntryChange>,
}

impl OperationMeta {
    pub fn new(changes: Vec<LedgerEntryChange>) -> Self {
        Self { changes }
    }
}

impl TransactionMeta {
    /// Every change in the meta, transaction-level first.
    pub fn all_changes(&self) -> impl Iterator<Item = &LedgerEntryChange> {
        self.tx_changes
            .iter()
            .chain(self.operations.iter().flat_map(|op| op.changes.iter()))
    }
}

/// Collapse the changes recorded for `key` into one pre/post pair.
///
/// A `State` record supplies the pre-image; the following `Created`,
/// `Updated` or `Removed` record supplies the post-image. Returns `None` when
/// no change mentions the key.
pub fn change_for_key(changes: &[LedgerEntryChange], key: &LedgerKey) -> Option<Change> {
    let mut found = false;
    let mut pre = None;
    let mut post = None;

    for change in changes.iter().filter(|c| &c.ledger_key() == key) {
        match change {
            LedgerEntryChange::State(entry) => {
                if !found {
                    pre = Some(entry.clone());
                }
            }
            LedgerEntryChange::Created(entry) | LedgerEntryChange::Updated(entry) => {
                post = Some(entry.clone());
            }
            LedgerEntryChange::Removed(_) => {
                post = None;
            }
        }
        found = true;
    }

    found.then(|| Change {
        entry_type: key.entry_type(),
        pre,
        post,
    })
}
