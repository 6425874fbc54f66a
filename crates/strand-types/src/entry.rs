use std::fmt;

use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::asset::{Asset, Price};
use crate::error::TypeError;
use crate::transaction::Signer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerEntryType {
    Account,
    Trustline,
    Offer,
    Data,
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedgerEntryType::Account => "account",
            LedgerEntryType::Trustline => "trustline",
            LedgerEntryType::Offer => "offer",
            LedgerEntryType::Data => "data",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account_id: AccountId,
    pub balance: i64,
    pub seq_num: i64,
    pub num_sub_entries: u32,
    pub inflation_dest: Option<AccountId>,
    pub flags: u32,
    pub home_domain: String,
    /// Master weight, low, medium and high thresholds.
    pub thresholds: [u8; 4],
    pub signers: Vec<Signer>,
}

impl AccountEntry {
    pub fn master_weight(&self) -> u32 {
        u32::from(self.thresholds[0])
    }

    /// Signer key address to weight, including the master key when its
    /// weight is non-zero.
    pub fn signer_summary(&self) -> Vec<(String, u32)> {
        let mut summary = Vec::with_capacity(self.signers.len() + 1);
        if self.master_weight() > 0 {
            summary.push((self.account_id.address(), self.master_weight()));
        }
        for signer in &self.signers {
            summary.push((signer.key.address(), signer.weight));
        }
        summary
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLineEntry {
    pub account_id: AccountId,
    pub asset: Asset,
    pub balance: i64,
    pub limit: i64,
    pub flags: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEntry {
    pub seller_id: AccountId,
    pub offer_id: i64,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: i64,
    pub price: Price,
    pub flags: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub account_id: AccountId,
    pub name: String,
    pub value: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntryData {
    Account(AccountEntry),
    Trustline(TrustLineEntry),
    Offer(OfferEntry),
    Data(DataEntry),
}

/// A piece of ledger state as of the ledger that last modified it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub last_modified_ledger_seq: u32,
    pub data: LedgerEntryData,
}

impl LedgerEntry {
    pub fn new(last_modified_ledger_seq: u32, data: LedgerEntryData) -> Self {
        Self {
            last_modified_ledger_seq,
            data,
        }
    }

    pub fn entry_type(&self) -> LedgerEntryType {
        match &self.data {
            LedgerEntryData::Account(_) => LedgerEntryType::Account,
            LedgerEntryData::Trustline(_) => LedgerEntryType::Trustline,
            LedgerEntryData::Offer(_) => LedgerEntryType::Offer,
            LedgerEntryData::Data(_) => LedgerEntryType::Data,
        }
    }

    /// The key identifying this entry in ledger state.
    pub fn ledger_key(&self) -> LedgerKey {
        match &self.data {
            LedgerEntryData::Account(a) => LedgerKey::Account {
                account_id: a.account_id,
            },
            LedgerEntryData::Trustline(t) => LedgerKey::Trustline {
                account_id: t.account_id,
                asset: t.asset.clone(),
            },
            LedgerEntryData::Offer(o) => LedgerKey::Offer {
                seller_id: o.seller_id,
                offer_id: o.offer_id,
            },
            LedgerEntryData::Data(d) => LedgerKey::Data {
                account_id: d.account_id,
                name: d.name.clone(),
            },
        }
    }

    /// Put the entry in canonical form so that equal state encodes to equal
    /// bytes. Account signers are ordered by key.
    pub fn normalize(&mut self) {
        if let LedgerEntryData::Account(account) = &mut self.data {
            account.signers.sort_by(|a, b| a.key.cmp(&b.key));
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    pub fn as_account(&self) -> Option<&AccountEntry> {
        match &self.data {
            LedgerEntryData::Account(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_offer(&self) -> Option<&OfferEntry> {
        match &self.data {
            LedgerEntryData::Offer(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataEntry> {
        match &self.data {
            LedgerEntryData::Data(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerKey {
    Account { account_id: AccountId },
    Trustline { account_id: AccountId, asset: Asset },
    Offer { seller_id: AccountId, offer_id: i64 },
    Data { account_id: AccountId, name: String },
}

impl LedgerKey {
    pub fn account(account_id: AccountId) -> Self {
        LedgerKey::Account { account_id }
    }

    pub fn trustline(account_id: AccountId, asset: Asset) -> Self {
        LedgerKey::Trustline { account_id, asset }
    }

    pub fn offer(seller_id: AccountId, offer_id: i64) -> Self {
        LedgerKey::Offer {
            seller_id,
            offer_id,
        }
    }

    pub fn data(account_id: AccountId, name: impl Into<String>) -> Self {
        LedgerKey::Data {
            account_id,
            name: name.into(),
        }
    }

    pub fn entry_type(&self) -> LedgerEntryType {
        match self {
            LedgerKey::Account { .. } => LedgerEntryType::Account,
            LedgerKey::Trustline { .. } => LedgerEntryType::Trustline,
            LedgerKey::Offer { .. } => LedgerEntryType::Offer,
            LedgerKey::Data { .. } => LedgerEntryType::Data,
        }
    }
}

/// One ledger-state transition recorded in transaction meta.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntryChange {
    Created(LedgerEntry),
    Updated(LedgerEntry),
    Removed(LedgerKey),
    /// The entry's state immediately before the following change.
    State(LedgerEntry),
}

impl LedgerEntryChange {
    pub fn ledger_key(&self) -> LedgerKey {
        match self {
            LedgerEntryChange::Created(e)
            | LedgerEntryChange::Updated(e)
            | LedgerEntryChange::State(e) => e.ledger_key(),
            LedgerEntryChange::Removed(key) => key.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Removed,
}

/// The pre-image and post-image of one ledger key across an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub entry_type: LedgerEntryType,
    pub pre: Option<LedgerEntry>,
    pub post: Option<LedgerEntry>,
}

impl Change {
    /// Classify the transition. A change with neither image cannot come
    /// from a well-formed meta stream.
    pub fn kind(&self) -> Result<ChangeKind, TypeError> {
        match (&self.pre, &self.post) {
            (None, Some(_)) => Ok(ChangeKind::Created),
            (Some(_), Some(_)) => Ok(ChangeKind::Updated),
            (Some(_), None) => Ok(ChangeKind::Removed),
            (None, None) => Err(TypeError::EmptyChange(self.entry_type.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketMetadata {
    pub ledger_version: u32,
}

/// One record of a bucket file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketEntry {
    Live(LedgerEntry),
    Init(LedgerEntry),
    /// Tombstone: the key was deleted.
    Dead(LedgerKey),
    Meta(BucketMetadata),
}

impl BucketEntry {
    /// The key this record speaks for; `None` for metadata.
    pub fn ledger_key(&self) -> Option<LedgerKey> {
        match self {
            BucketEntry::Live(e) | BucketEntry::Init(e) => Some(e.ledger_key()),
            BucketEntry::Dead(key) => Some(key.clone()),
            BucketEntry::Meta(_) => None,
        }
    }
}
