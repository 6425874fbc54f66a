use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::schema::{AccountRef, Column, Row, Table};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub id: i64,
    pub sequence: u32,
    /// Version of the importer that wrote the row.
    pub importer_version: i32,
    pub ledger_hash: String,
    /// Absent for the genesis ledger.
    pub previous_ledger_hash: Option<String>,
    pub total_coins: i64,
    pub fee_pool: i64,
    pub base_fee: u32,
    pub base_reserve: u32,
    pub max_tx_set_size: u32,
    pub closed_at: DateTime<Utc>,
    pub transaction_count: i32,
    pub successful_transaction_count: i32,
    pub failed_transaction_count: i32,
    pub operation_count: i32,
    pub protocol_version: u32,
    /// Canonical header encoding, base64.
    pub ledger_header: String,
}

impl Row for LedgerRow {
    const TABLE: Table = Table::Ledgers;
    const COLUMNS: &'static [Column<Self>] = &[
        Column { name: "id", get: |r| json!(r.id) },
        Column { name: "sequence", get: |r| json!(r.sequence) },
        Column { name: "importer_version", get: |r| json!(r.importer_version) },
        Column { name: "ledger_hash", get: |r| json!(r.ledger_hash) },
        Column { name: "previous_ledger_hash", get: |r| json!(r.previous_ledger_hash) },
        Column { name: "total_coins", get: |r| json!(r.total_coins) },
        Column { name: "fee_pool", get: |r| json!(r.fee_pool) },
        Column { name: "base_fee", get: |r| json!(r.base_fee) },
        Column { name: "base_reserve", get: |r| json!(r.base_reserve) },
        Column { name: "max_tx_set_size", get: |r| json!(r.max_tx_set_size) },
        Column { name: "closed_at", get: |r| json!(r.closed_at) },
        Column { name: "transaction_count", get: |r| json!(r.transaction_count) },
        Column {
            name: "successful_transaction_count",
            get: |r| json!(r.successful_transaction_count),
        },
        Column {
            name: "failed_transaction_count",
            get: |r| json!(r.failed_transaction_count),
        },
        Column { name: "operation_count", get: |r| json!(r.operation_count) },
        Column { name: "protocol_version", get: |r| json!(r.protocol_version) },
        Column { name: "ledger_header", get: |r| json!(r.ledger_header) },
    ];

    fn key(&self) -> i64 {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub id: i64,
    pub transaction_hash: String,
    pub ledger_sequence: u32,
    pub application_order: u32,
    pub account: String,
    pub account_sequence: i64,
    pub max_fee: u32,
    pub fee_charged: i64,
    pub operation_count: i32,
    pub tx_envelope: String,
    pub tx_result: String,
    pub tx_meta: String,
    pub tx_fee_meta: String,
    pub signatures: Vec<String>,
    /// `[min,max)` in unix seconds; an open upper bound renders as `[min,)`.
    pub time_bounds: Option<String>,
    pub memo_type: String,
    pub memo: Option<String>,
    pub successful: bool,
}

impl Row for TransactionRow {
    const TABLE: Table = Table::Transactions;
    const COLUMNS: &'static [Column<Self>] = &[
        Column { name: "id", get: |r| json!(r.id) },
        Column { name: "transaction_hash", get: |r| json!(r.transaction_hash) },
        Column { name: "ledger_sequence", get: |r| json!(r.ledger_sequence) },
        Column { name: "application_order", get: |r| json!(r.application_order) },
        Column { name: "account", get: |r| json!(r.account) },
        Column { name: "account_sequence", get: |r| json!(r.account_sequence) },
        Column { name: "max_fee", get: |r| json!(r.max_fee) },
        Column { name: "fee_charged", get: |r| json!(r.fee_charged) },
        Column { name: "operation_count", get: |r| json!(r.operation_count) },
        Column { name: "tx_envelope", get: |r| json!(r.tx_envelope) },
        Column { name: "tx_result", get: |r| json!(r.tx_result) },
        Column { name: "tx_meta", get: |r| json!(r.tx_meta) },
        Column { name: "tx_fee_meta", get: |r| json!(r.tx_fee_meta) },
        Column { name: "signatures", get: |r| json!(r.signatures) },
        Column { name: "time_bounds", get: |r| json!(r.time_bounds) },
        Column { name: "memo_type", get: |r| json!(r.memo_type) },
        Column { name: "memo", get: |r| json!(r.memo) },
        Column { name: "successful", get: |r| json!(r.successful) },
    ];

    fn key(&self) -> i64 {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationRow {
    pub id: i64,
    pub transaction_id: i64,
    pub application_order: u32,
    pub source_account: String,
    #[serde(rename = "type")]
    pub operation_type: i32,
    pub details: Value,
}

impl Row for OperationRow {
    const TABLE: Table = Table::Operations;
    const COLUMNS: &'static [Column<Self>] = &[
        Column { name: "id", get: |r| json!(r.id) },
        Column { name: "transaction_id", get: |r| json!(r.transaction_id) },
        Column { name: "application_order", get: |r| json!(r.application_order) },
        Column { name: "source_account", get: |r| json!(r.source_account) },
        Column { name: "type", get: |r| json!(r.operation_type) },
        Column { name: "details", get: |r| r.details.clone() },
    ];

    fn key(&self) -> i64 {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionParticipantRow {
    pub history_transaction_id: i64,
    pub history_account_id: AccountRef,
}

impl Row for TransactionParticipantRow {
    const TABLE: Table = Table::TransactionParticipants;
    const COLUMNS: &'static [Column<Self>] = &[
        Column {
            name: "history_transaction_id",
            get: |r| json!(r.history_transaction_id),
        },
        Column {
            name: "history_account_id",
            get: |r| Value::from(&r.history_account_id),
        },
    ];

    fn key(&self) -> i64 {
        self.history_transaction_id
    }

    fn accounts_mut(&mut self) -> Vec<&mut AccountRef> {
        vec![&mut self.history_account_id]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationParticipantRow {
    pub history_operation_id: i64,
    pub history_account_id: AccountRef,
}

impl Row for OperationParticipantRow {
    const TABLE: Table = Table::OperationParticipants;
    const COLUMNS: &'static [Column<Self>] = &[
        Column {
            name: "history_operation_id",
            get: |r| json!(r.history_operation_id),
        },
        Column {
            name: "history_account_id",
            get: |r| Value::from(&r.history_account_id),
        },
    ];

    fn key(&self) -> i64 {
        self.history_operation_id
    }

    fn accounts_mut(&mut self) -> Vec<&mut AccountRef> {
        vec![&mut self.history_account_id]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectRow {
    pub history_account_id: AccountRef,
    pub history_operation_id: i64,
    /// 1-based position within the operation's effects.
    pub order: u32,
    #[serde(rename = "type")]
    pub effect_type: i32,
    pub details: Value,
}

impl Row for EffectRow {
    const TABLE: Table = Table::Effects;
    const COLUMNS: &'static [Column<Self>] = &[
        Column {
            name: "history_account_id",
            get: |r| Value::from(&r.history_account_id),
        },
        Column {
            name: "history_operation_id",
            get: |r| json!(r.history_operation_id),
        },
        Column { name: "order", get: |r| json!(r.order) },
        Column { name: "type", get: |r| json!(r.effect_type) },
        Column { name: "details", get: |r| r.details.clone() },
    ];

    fn key(&self) -> i64 {
        self.history_operation_id
    }

    fn accounts_mut(&mut self) -> Vec<&mut AccountRef> {
        vec![&mut self.history_account_id]
    }
}

/// One matched offer, oriented so that the base asset sorts before the
/// counter asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    pub history_operation_id: i64,
    pub order: u32,
    pub ledger_closed_at: DateTime<Utc>,
    /// The claimed (resting) offer.
    pub offer_id: i64,
    pub base_offer_id: Option<i64>,
    pub base_account_id: AccountRef,
    pub base_asset: String,
    pub base_amount: i64,
    pub counter_offer_id: Option<i64>,
    pub counter_account_id: AccountRef,
    pub counter_asset: String,
    pub counter_amount: i64,
    pub base_is_seller: bool,
    /// Price of the claimed offer before the trade.
    pub price_n: Option<i32>,
    pub price_d: Option<i32>,
}

impl Row for TradeRow {
    const TABLE: Table = Table::Trades;
    const COLUMNS: &'static [Column<Self>] = &[
        Column {
            name: "history_operation_id",
            get: |r| json!(r.history_operation_id),
        },
        Column { name: "order", get: |r| json!(r.order) },
        Column { name: "ledger_closed_at", get: |r| json!(r.ledger_closed_at) },
        Column { name: "offer_id", get: |r| json!(r.offer_id) },
        Column { name: "base_offer_id", get: |r| json!(r.base_offer_id) },
        Column {
            name: "base_account_id",
            get: |r| Value::from(&r.base_account_id),
        },
        Column { name: "base_asset", get: |r| json!(r.base_asset) },
        Column { name: "base_amount", get: |r| json!(r.base_amount) },
        Column { name: "counter_offer_id", get: |r| json!(r.counter_offer_id) },
        Column {
            name: "counter_account_id",
            get: |r| Value::from(&r.counter_account_id),
        },
        Column { name: "counter_asset", get: |r| json!(r.counter_asset) },
        Column { name: "counter_amount", get: |r| json!(r.counter_amount) },
        Column { name: "base_is_seller", get: |r| json!(r.base_is_seller) },
        Column { name: "price_n", get: |r| json!(r.price_n) },
        Column { name: "price_d", get: |r| json!(r.price_d) },
    ];

    fn key(&self) -> i64 {
        self.history_operation_id
    }

    fn accounts_mut(&mut self) -> Vec<&mut AccountRef> {
        vec![&mut self.base_account_id, &mut self.counter_account_id]
    }
}

/// A participant account and its surrogate id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRow {
    pub id: i64,
    pub address: String,
}
