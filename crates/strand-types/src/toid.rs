//! Total order ids.
//!
//! A `Toid` packs a ledger sequence, a transaction's 1-based application order
//! and an operation's 1-based order into one `i64`, so that sorting history
//! rows by id yields ledger-major, transaction-major, operation-minor order.
//!
//! Layout (most significant bit first):
//!
//! ```text
//! | ledger sequence (32 bits) | transaction order (20 bits) | operation order (12 bits) |
//! ```
//!
//! The widths follow the protocol limits: a ledger holds at most 2^20 - 1
//! transactions and a transaction at most 2^12 - 1 operations. Order zero
//! addresses the enclosing row: `Toid::new(seq, 0, 0)` is the ledger itself
//! and `Toid::new(seq, tx, 0)` the transaction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

pub const LEDGER_MASK: u64 = (1 << 32) - 1;
pub const TRANSACTION_MASK: u64 = (1 << 20) - 1;
pub const OPERATION_MASK: u64 = (1 << 12) - 1;

pub const LEDGER_SHIFT: u32 = 32;
pub const TRANSACTION_SHIFT: u32 = 12;
pub const OPERATION_SHIFT: u32 = 0;

/// Largest ledger sequence that still yields a non-negative id.
pub const MAX_LEDGER_SEQUENCE: u32 = i32::MAX as u32;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Toid {
    pub ledger_sequence: u32,
    pub transaction_order: u32,
    pub operation_order: u32,
}

impl Toid {
    pub const fn new(ledger_sequence: u32, transaction_order: u32, operation_order: u32) -> Self {
        Self {
            ledger_sequence,
            transaction_order,
            operation_order,
        }
    }

    /// Id of the ledger row itself.
    pub const fn ledger(sequence: u32) -> Self {
        Self::new(sequence, 0, 0)
    }

    /// Check that every component fits its field.
    pub fn validate(&self) -> Result<(), TypeError> {
        check("ledger_sequence", self.ledger_sequence, MAX_LEDGER_SEQUENCE as u64)?;
        check("transaction_order", self.transaction_order, TRANSACTION_MASK)?;
        check("operation_order", self.operation_order, OPERATION_MASK)
    }

    /// Pack into the sortable 64-bit form.
    ///
    /// Components are masked to their field widths; call [`Toid::validate`]
    /// first when they come from untrusted input.
    pub fn to_i64(&self) -> i64 {
        let packed = ((self.ledger_sequence as u64 & LEDGER_MASK) << LEDGER_SHIFT)
            | ((self.transaction_order as u64 & TRANSACTION_MASK) << TRANSACTION_SHIFT)
            | ((self.operation_order as u64 & OPERATION_MASK) << OPERATION_SHIFT);
        packed as i64
    }

    pub fn from_i64(id: i64) -> Self {
        let id = id as u64;
        Self {
            ledger_sequence: ((id >> LEDGER_SHIFT) & LEDGER_MASK) as u32,
            transaction_order: ((id >> TRANSACTION_SHIFT) & TRANSACTION_MASK) as u32,
            operation_order: ((id >> OPERATION_SHIFT) & OPERATION_MASK) as u32,
        }
    }

    /// The half-open id range `[start, end)` covering every row of a ledger.
    pub fn ledger_range(sequence: u32) -> (i64, i64) {
        (
            Toid::ledger(sequence).to_i64(),
            Toid::ledger(sequence + 1).to_i64(),
        )
    }

    /// The half-open id range covering ledgers `start..=end`.
    pub fn ledgers_range(start: u32, end: u32) -> (i64, i64) {
        (
            Toid::ledger(start).to_i64(),
            Toid::ledger(end + 1).to_i64(),
        )
    }
}

fn check(component: &'static str, value: u32, max: u64) -> Result<(), TypeError> {
    if value as u64 > max {
        return Err(TypeError::IdOutOfRange {
            component,
            value: value as u64,
            max,
        });
    }
    Ok(())
}

impl fmt::Debug for Toid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Toid({}/{}/{})",
            self.ledger_sequence, self.transaction_order, self.operation_order
        )
    }
}

impl fmt::Display for Toid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_i64())
    }
}
