//! Typed access to an operation's result arm.
//!
//! Every accessor checks the arm tag against the operation type and turns
//! a disagreement into [`IngestError::ResultMismatch`]. The one tolerated
//! disagreement is documented on [`offer_success`].

use strand_types::{
    ClaimOfferAtom, InflationPayout, ManageOfferSuccess, OpResult, OperationResultTr,
    OperationType, PathPaymentSuccess,
};

use crate::cursor::OperationView;
use crate::error::{IngestError, IngestResult};

fn success<'a, T>(
    view: &OperationView<'a>,
    tr: &'a OperationResultTr,
    result: &'a OpResult<T>,
) -> IngestResult<&'a T> {
    result.success().ok_or_else(|| IngestError::ResultMismatch {
        operation_id: view.operation_id,
        expected: view.operation_type(),
        actual: format!("failed {}", tr.tag()),
    })
}

pub fn path_payment_success<'a>(view: &OperationView<'a>) -> IngestResult<&'a PathPaymentSuccess> {
    let tr = view.require_result()?;
    let result = match (view.operation_type(), tr) {
        (OperationType::PathPaymentStrictReceive, OperationResultTr::PathPaymentStrictReceive(r))
        | (OperationType::PathPaymentStrictSend, OperationResultTr::PathPaymentStrictSend(r)) => r,
        _ => return Err(view.mismatch(tr)),
    };
    success(view, tr, result)
}

/// Success payload of a manage-sell, manage-buy or passive offer.
///
/// Ledgers closed under older protocol versions report a passive offer's
/// outcome under the manage-sell-offer arm, so for passive offers the arm
/// actually present decides how the payload is read.
pub fn offer_success<'a>(view: &OperationView<'a>) -> IngestResult<&'a ManageOfferSuccess> {
    let tr = view.require_result()?;
    let result = match (view.operation_type(), tr) {
        (OperationType::ManageSellOffer, OperationResultTr::ManageSellOffer(r))
        | (OperationType::ManageBuyOffer, OperationResultTr::ManageBuyOffer(r))
        | (OperationType::CreatePassiveSellOffer, OperationResultTr::CreatePassiveSellOffer(r))
        | (OperationType::CreatePassiveSellOffer, OperationResultTr::ManageSellOffer(r)) => r,
        _ => return Err(view.mismatch(tr)),
    };
    success(view, tr, result)
}

/// Balance moved by a successful account merge.
pub fn merged_balance(view: &OperationView<'_>) -> IngestResult<i64> {
    let tr = view.require_result()?;
    match tr {
        OperationResultTr::AccountMerge(r) if view.operation_type() == OperationType::AccountMerge => {
            success(view, tr, r).copied()
        }
        _ => Err(view.mismatch(tr)),
    }
}

pub fn inflation_payouts<'a>(view: &OperationView<'a>) -> IngestResult<&'a [InflationPayout]> {
    let tr = view.require_result()?;
    match tr {
        OperationResultTr::Inflation(r) if view.operation_type() == OperationType::Inflation => {
            success(view, tr, r).map(Vec::as_slice)
        }
        _ => Err(view.mismatch(tr)),
    }
}

/// Offers crossed by the operation. Empty for operation types that never
/// cross offers.
pub fn claimed_offers<'a>(view: &OperationView<'a>) -> IngestResult<&'a [ClaimOfferAtom]> {
    match view.operation_type() {
        OperationType::PathPaymentStrictReceive | OperationType::PathPaymentStrictSend => {
            Ok(&path_payment_success(view)?.offers)
        }
        OperationType::ManageSellOffer
        | OperationType::ManageBuyOffer
        | OperationType::CreatePassiveSellOffer => Ok(&offer_success(view)?.offers_claimed),
        _ => Ok(&[]),
    }
}
