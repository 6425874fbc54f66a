//! Trade rows for offers crossed by an operation.

use chrono::{DateTime, Utc};
use strand_history::{AccountRef, TradeRow};
use strand_types::{codec, Asset, ClaimOfferAtom, LedgerKey, OperationType};

use crate::cursor::OperationView;
use crate::error::{IngestError, IngestResult};
use crate::results;

/// Close time of a ledger as a UTC timestamp. Fails for seconds past what
/// `chrono` can represent.
pub fn closed_at(close_time: u64) -> IngestResult<DateTime<Utc>> {
    i64::try_from(close_time)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or(IngestError::InvalidCloseTime(close_time))
}

/// Whether `a` sorts before `b` as a base asset. Ties cannot happen, since
/// a claim never trades an asset for itself.
fn base_first(a: &Asset, b: &Asset) -> IngestResult<bool> {
    Ok(codec::encode(a)? < codec::encode(b)?)
}

/// One row per non-empty claim, ordered by the claim's position in the
/// result.
pub fn trade_rows(view: &OperationView<'_>) -> IngestResult<Vec<TradeRow>> {
    let claims = results::claimed_offers(view)?;
    if claims.is_empty() {
        return Ok(Vec::new());
    }
    let buy_offer_id = match view.operation_type() {
        OperationType::ManageSellOffer
        | OperationType::ManageBuyOffer
        | OperationType::CreatePassiveSellOffer => results::offer_success(view)?
            .remaining_offer()
            .map(|offer| offer.offer_id),
        _ => None,
    };
    let ledger_closed_at = closed_at(view.ledger.close_time)?;

    let mut rows = Vec::new();
    for (order, claim) in claims.iter().enumerate() {
        if claim.is_empty() {
            continue;
        }
        rows.push(trade_row(
            view,
            order as u32,
            ledger_closed_at,
            claim,
            buy_offer_id,
        )?);
    }
    Ok(rows)
}

fn trade_row(
    view: &OperationView<'_>,
    order: u32,
    ledger_closed_at: DateTime<Utc>,
    claim: &ClaimOfferAtom,
    buy_offer_id: Option<i64>,
) -> IngestResult<TradeRow> {
    let seller = AccountRef::Address(claim.seller_id.address());
    let buyer = AccountRef::Address(view.source.address());
    let sell_price = view
        .before_and_after(&LedgerKey::offer(claim.seller_id, claim.offer_id))
        .and_then(|change| change.pre)
        .and_then(|entry| entry.as_offer().map(|offer| offer.price));

    let row = if base_first(&claim.asset_sold, &claim.asset_bought)? {
        TradeRow {
            history_operation_id: view.operation_id,
            order,
            ledger_closed_at,
            offer_id: claim.offer_id,
            base_offer_id: Some(claim.offer_id),
            base_account_id: seller,
            base_asset: claim.asset_sold.to_string(),
            base_amount: claim.amount_sold,
            counter_offer_id: buy_offer_id,
            counter_account_id: buyer,
            counter_asset: claim.asset_bought.to_string(),
            counter_amount: claim.amount_bought,
            base_is_seller: true,
            price_n: sell_price.map(|p| p.n),
            price_d: sell_price.map(|p| p.d),
        }
    } else {
        TradeRow {
            history_operation_id: view.operation_id,
            order,
            ledger_closed_at,
            offer_id: claim.offer_id,
            base_offer_id: buy_offer_id,
            base_account_id: buyer,
            base_asset: claim.asset_bought.to_string(),
            base_amount: claim.amount_bought,
            counter_offer_id: Some(claim.offer_id),
            counter_account_id: seller,
            counter_asset: claim.asset_sold.to_string(),
            counter_amount: claim.amount_sold,
            base_is_seller: false,
            price_n: sell_price.map(|p| p.d),
            price_d: sell_price.map(|p| p.n),
        }
    };
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use strand_types::{
        AccountId, LedgerEntry, LedgerEntryChange, LedgerEntryData, ManageOfferEffect,
        ManageOfferSuccess, ManageSellOfferOp, OfferEntry, OpResult, OperationBody,
        OperationResultTr, Price,
    };

    fn usd() -> Asset {
        Asset::credit("USD", AccountId::from_seed("issuer"))
    }

    fn seller() -> AccountId {
        AccountId::from_seed("seller")
    }

    fn resting_offer(price: Price) -> LedgerEntry {
        LedgerEntry::new(
            LEDGER,
            LedgerEntryData::Offer(OfferEntry {
                seller_id: seller(),
                offer_id: 11,
                selling: usd(),
                buying: Asset::Native,
                amount: 1000,
                price,
                flags: 0,
            }),
        )
    }

    fn fixture(claims: Vec<ClaimOfferAtom>, remaining: ManageOfferEffect) -> Fixture {
        Fixture::single(
            OperationBody::ManageSellOffer(ManageSellOfferOp {
                selling: Asset::Native,
                buying: usd(),
                amount: 100,
                price: Price::new(2, 1),
                offer_id: 0,
            }),
            Some(OperationResultTr::ManageSellOffer(OpResult::Success(
                ManageOfferSuccess {
                    offers_claimed: claims,
                    offer: remaining,
                },
            ))),
            vec![
                LedgerEntryChange::State(resting_offer(Price::new(1, 2))),
                LedgerEntryChange::Removed(LedgerKey::offer(seller(), 11)),
            ],
        )
    }

    fn claim(sold: i64, bought: i64) -> ClaimOfferAtom {
        ClaimOfferAtom {
            seller_id: seller(),
            offer_id: 11,
            asset_sold: usd(),
            amount_sold: sold,
            asset_bought: Asset::Native,
            amount_bought: bought,
        }
    }

    #[test]
    fn native_is_base() {
        let fixture = fixture(vec![claim(0, 0), claim(40, 20)], ManageOfferEffect::Deleted);
        let rows = trade_rows(&fixture.view()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.order, 1);
        assert!(!row.base_is_seller);
        assert_eq!(row.base_asset, "native");
        assert_eq!(row.base_amount, 20);
        assert_eq!(row.base_account_id, AccountRef::Address(source().address()));
        assert_eq!(row.counter_offer_id, Some(11));
        assert_eq!(row.counter_amount, 40);
        assert_eq!((row.price_n, row.price_d), (Some(2), Some(1)));
        assert_eq!(
            row.ledger_closed_at,
            closed_at(fixture.ledger.close_time).unwrap()
        );
    }

    #[test]
    fn remaining_offer_is_the_buy_offer() {
        let remaining = OfferEntry {
            seller_id: source(),
            offer_id: 77,
            selling: Asset::Native,
            buying: usd(),
            amount: 60,
            price: Price::new(2, 1),
            flags: 0,
        };
        let fixture = fixture(vec![claim(40, 20)], ManageOfferEffect::Created(remaining));
        let rows = trade_rows(&fixture.view()).unwrap();
        assert_eq!(rows[0].base_offer_id, Some(77));
        assert_eq!(rows[0].offer_id, 11);
    }

    #[test]
    fn close_time_conversion() {
        assert_eq!(closed_at(0).unwrap(), DateTime::<Utc>::default());
        assert_eq!(closed_at(1_600_000_000).unwrap().timestamp(), 1_600_000_000);
        assert!(matches!(
            closed_at(u64::MAX),
            Err(IngestError::InvalidCloseTime(u64::MAX))
        ));
        assert!(closed_at(i64::MAX as u64).is_err());
    }
}
