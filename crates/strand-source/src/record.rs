use serde::{Deserialize, Serialize};
use strand_types::{
    codec, AccountId, Hash256, LedgerEntryChange, Operation, TransactionEnvelope,
    TransactionMeta, TransactionResult,
};

use crate::error::{SourceError, SourceResult};

/// A transaction row as the source database stores it: encoded blobs keyed
/// by ledger and application order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub ledger_sequence: u32,
    /// 1-based position within the ledger.
    pub application_order: u32,
    pub hash: Hash256,
    pub envelope: Vec<u8>,
    pub result: Vec<u8>,
    pub meta: Vec<u8>,
}

/// Fee-processing changes charged for one transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRecord {
    pub ledger_sequence: u32,
    pub application_order: u32,
    pub changes: Vec<u8>,
}

/// A decoded transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub ledger_sequence: u32,
    pub application_order: u32,
    pub hash: Hash256,
    pub envelope: TransactionEnvelope,
    pub result: TransactionResult,
    pub meta: TransactionMeta,
    pub fee_changes: Vec<LedgerEntryChange>,
    /// The raw blobs, kept for storage in history rows.
    pub record: TransactionRecord,
    pub fee_record: Option<FeeRecord>,
}

impl Transaction {
    pub fn is_successful(&self) -> bool {
        self.result.is_success()
    }

    pub fn source_account(&self) -> AccountId {
        self.envelope.source_account
    }

    pub fn operation_count(&self) -> usize {
        self.envelope.operations.len()
    }

    /// Source account of an operation, defaulting to the transaction source.
    pub fn operation_source(&self, operation: &Operation) -> AccountId {
        operation
            .source_account
            .unwrap_or(self.envelope.source_account)
    }
}

impl TransactionRecord {
    /// Encode a transaction into its stored form.
    pub fn encode(
        ledger_sequence: u32,
        application_order: u32,
        envelope: &TransactionEnvelope,
        result: &TransactionResult,
        meta: &TransactionMeta,
    ) -> SourceResult<Self> {
        let fail = |what: &'static str| {
            move |e: strand_types::TypeError| SourceError::Decode {
                ledger: ledger_sequence,
                index: application_order,
                what,
                reason: e.to_string(),
            }
        };
        let envelope = codec::encode(envelope).map_err(fail("envelope"))?;
        Ok(Self {
            ledger_sequence,
            application_order,
            hash: Hash256::digest(&envelope),
            result: codec::encode(result).map_err(fail("result"))?,
            meta: codec::encode(meta).map_err(fail("meta"))?,
            envelope,
        })
    }

    /// Decode the blobs, pairing the record with its fee changes.
    pub fn decode(&self, fee: Option<&FeeRecord>) -> SourceResult<Transaction> {
        let envelope = self.decode_part("envelope", &self.envelope)?;
        let result = self.decode_part("result", &self.result)?;
        let meta = self.decode_part("meta", &self.meta)?;
        let fee_changes = match fee {
            Some(fee) => self.decode_part("fee changes", &fee.changes)?,
            None => Vec::new(),
        };
        Ok(Transaction {
            ledger_sequence: self.ledger_sequence,
            application_order: self.application_order,
            hash: self.hash,
            envelope,
            result,
            meta,
            fee_changes,
            record: self.clone(),
            fee_record: fee.cloned(),
        })
    }

    fn decode_part<T: serde::de::DeserializeOwned>(
        &self,
        what: &'static str,
        bytes: &[u8],
    ) -> SourceResult<T> {
        codec::decode(bytes).map_err(|e| SourceError::Decode {
            ledger: self.ledger_sequence,
            index: self.application_order,
            what,
            reason: e.to_string(),
        })
    }
}

impl FeeRecord {
    pub fn encode(
        ledger_sequence: u32,
        application_order: u32,
        changes: &[LedgerEntryChange],
    ) -> SourceResult<Self> {
        let changes = codec::encode(&changes).map_err(|e| SourceError::Decode {
            ledger: ledger_sequence,
            index: application_order,
            what: "fee changes",
            reason: e.to_string(),
        })?;
        Ok(Self {
            ledger_sequence,
            application_order,
            changes,
        })
    }
}
