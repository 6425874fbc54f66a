use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::asset::Asset;
use crate::entry::OfferEntry;
use crate::transaction::OperationType;

/// Outcome of applying one transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub fee_charged: i64,
    pub code: TransactionResultCode,
    /// One entry per operation. Empty when the transaction failed before
    /// any operation was applied.
    pub results: Vec<OperationResult>,
}

impl TransactionResult {
    pub fn is_success(&self) -> bool {
        self.code == TransactionResultCode::Success
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionResultCode {
    Success,
    Failed,
    TooEarly,
    TooLate,
    MissingOperation,
    BadSeq,
    BadAuth,
    InsufficientBalance,
    NoAccount,
    InsufficientFee,
    BadAuthExtra,
    InternalError,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    Inner(OperationResultTr),
    BadAuth,
    NoAccount,
    NotSupported,
}

impl OperationResult {
    pub fn inner(&self) -> Option<&OperationResultTr> {
        match self {
            OperationResult::Inner(tr) => Some(tr),
            _ => None,
        }
    }
}

/// Either the success payload of an operation or its protocol failure code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpResult<T> {
    Success(T),
    Failure(i32),
}

impl<T> OpResult<T> {
    pub fn success(&self) -> Option<&T> {
        match self {
            OpResult::Success(value) => Some(value),
            OpResult::Failure(_) => None,
        }
    }
}

/// The per-type result arm of an applied operation.
///
/// The arm tag normally matches the operation's type, but this is not
/// guaranteed: older protocol versions emit the manage-sell-offer arm for
/// create-passive-sell-offer operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResultTr {
    CreateAccount(OpResult<()>),
    Payment(OpResult<()>),
    PathPaymentStrictReceive(OpResult<PathPaymentSuccess>),
    ManageSellOffer(OpResult<ManageOfferSuccess>),
    CreatePassiveSellOffer(OpResult<ManageOfferSuccess>),
    SetOptions(OpResult<()>),
    ChangeTrust(OpResult<()>),
    AllowTrust(OpResult<()>),
    /// Success carries the merged account's balance.
    AccountMerge(OpResult<i64>),
    Inflation(OpResult<Vec<InflationPayout>>),
    ManageData(OpResult<()>),
    BumpSequence(OpResult<()>),
    ManageBuyOffer(OpResult<ManageOfferSuccess>),
    PathPaymentStrictSend(OpResult<PathPaymentSuccess>),
}

impl OperationResultTr {
    /// The operation type named by the arm tag.
    pub fn tag(&self) -> OperationType {
        match self {
            OperationResultTr::CreateAccount(_) => OperationType::CreateAccount,
            OperationResultTr::Payment(_) => OperationType::Payment,
            OperationResultTr::PathPaymentStrictReceive(_) => {
                OperationType::PathPaymentStrictReceive
            }
            OperationResultTr::ManageSellOffer(_) => OperationType::ManageSellOffer,
            OperationResultTr::CreatePassiveSellOffer(_) => OperationType::CreatePassiveSellOffer,
            OperationResultTr::SetOptions(_) => OperationType::SetOptions,
            OperationResultTr::ChangeTrust(_) => OperationType::ChangeTrust,
            OperationResultTr::AllowTrust(_) => OperationType::AllowTrust,
            OperationResultTr::AccountMerge(_) => OperationType::AccountMerge,
            OperationResultTr::Inflation(_) => OperationType::Inflation,
            OperationResultTr::ManageData(_) => OperationType::ManageData,
            OperationResultTr::BumpSequence(_) => OperationType::BumpSequence,
            OperationResultTr::ManageBuyOffer(_) => OperationType::ManageBuyOffer,
            OperationResultTr::PathPaymentStrictSend(_) => OperationType::PathPaymentStrictSend,
        }
    }
}

/// One offer crossed while applying an offer or path payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimOfferAtom {
    pub seller_id: AccountId,
    pub offer_id: i64,
    pub asset_sold: Asset,
    pub amount_sold: i64,
    pub asset_bought: Asset,
    pub amount_bought: i64,
}

impl ClaimOfferAtom {
    /// Offers removed for lack of funds are reported with both amounts zero.
    pub fn is_empty(&self) -> bool {
        self.amount_sold == 0 && self.amount_bought == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplePaymentResult {
    pub destination: AccountId,
    pub asset: Asset,
    pub amount: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPaymentSuccess {
    pub offers: Vec<ClaimOfferAtom>,
    pub last: SimplePaymentResult,
}

impl PathPaymentSuccess {
    /// Amount debited from the sender of a strict-receive path payment.
    ///
    /// Without crossed offers this is the final payment itself; otherwise it
    /// is the sum bought by the first hop's offers.
    pub fn send_amount(&self) -> i64 {
        let Some(first) = self.offers.first() else {
            return self.last.amount;
        };
        self.offers
            .iter()
            .filter(|claim| claim.asset_bought == first.asset_bought)
            .map(|claim| claim.amount_bought)
            .sum()
    }

    /// Amount credited to the destination of a strict-send path payment.
    pub fn dest_amount(&self) -> i64 {
        self.last.amount
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManageOfferEffect {
    Created(OfferEntry),
    Updated(OfferEntry),
    Deleted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManageOfferSuccess {
    pub offers_claimed: Vec<ClaimOfferAtom>,
    pub offer: ManageOfferEffect,
}

impl ManageOfferSuccess {
    /// The offer left on the book by the operation, if any.
    pub fn remaining_offer(&self) -> Option<&OfferEntry> {
        match &self.offer {
            ManageOfferEffect::Created(offer) | ManageOfferEffect::Updated(offer) => Some(offer),
            ManageOfferEffect::Deleted => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InflationPayout {
    pub destination: AccountId,
    pub amount: i64,
}
