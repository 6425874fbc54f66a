//! Foundation types for Strand.
//!
//! This crate models the source chain's ledger-close data: headers,
//! transaction envelopes, results and meta, ledger entries and keys, and the
//! bucket records of checkpoint archives. Every other Strand crate depends on
//! `strand-types`.
//!
//! # Key Types
//!
//! - [`Hash256`] — 32-byte ledger, transaction and bucket hash
//! - [`AccountId`] — ed25519 account key with strkey addresses
//! - [`Toid`] — packed, sortable ledger/transaction/operation id
//! - [`TransactionEnvelope`], [`TransactionResult`], [`TransactionMeta`] — one applied transaction
//! - [`LedgerEntry`], [`LedgerKey`], [`Change`] — ledger state and its transitions
//! - [`BucketEntry`] — one record of a checkpoint bucket

pub mod account;
pub mod asset;
pub mod codec;
pub mod entry;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod meta;
pub mod result;
pub mod toid;
pub mod transaction;

pub use account::AccountId;
pub use asset::{format_amount, Asset, Price, STROOPS_PER_UNIT};
pub use entry::{
    AccountEntry, BucketEntry, BucketMetadata, Change, ChangeKind, DataEntry, LedgerEntry,
    LedgerEntryChange, LedgerEntryData, LedgerEntryType, LedgerKey, OfferEntry, TrustLineEntry,
};
pub use error::TypeError;
pub use hash::Hash256;
pub use ledger::LedgerHeader;
pub use meta::{change_for_key, OperationMeta, TransactionMeta};
pub use result::{
    ClaimOfferAtom, InflationPayout, ManageOfferEffect, ManageOfferSuccess, OpResult,
    OperationResult, OperationResultTr, PathPaymentSuccess, SimplePaymentResult,
    TransactionResult, TransactionResultCode,
};
pub use toid::Toid;
pub use transaction::{
    AllowTrustOp, BumpSequenceOp, ChangeTrustOp, CreateAccountOp, CreatePassiveSellOfferOp,
    ManageBuyOfferOp, ManageDataOp, ManageSellOfferOp, Memo, Operation, OperationBody,
    OperationType, PathPaymentStrictReceiveOp, PathPaymentStrictSendOp, PaymentOp, SetOptionsOp,
    Signer, TimeBounds, TransactionEnvelope,
};
