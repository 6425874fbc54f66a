//! Effect derivation.
//!
//! An effect is a user-facing consequence of a successful operation on one
//! account. [`ingest_effects`] turns an operation, its result arm and its
//! recorded state changes into an ordered list of effects, handed one at a
//! time to an [`EffectIngestion`].

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use strand_types::transaction::{AUTH_IMMUTABLE_FLAG, AUTH_REQUIRED_FLAG, AUTH_REVOCABLE_FLAG};
use strand_types::{
    format_amount, AccountId, Asset, ChangeKind, ClaimOfferAtom, LedgerKey,
    OperationBody, SetOptionsOp,
};

use crate::cursor::OperationView;
use crate::details::asset_details;
use crate::error::{IngestError, IngestResult};
use crate::results;

/// Kinds of effect, with their stored numeric codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectType {
    AccountCreated,
    AccountRemoved,
    AccountCredited,
    AccountDebited,
    AccountThresholdsUpdated,
    AccountHomeDomainUpdated,
    AccountFlagsUpdated,
    AccountInflationDestinationUpdated,
    SignerCreated,
    SignerRemoved,
    SignerUpdated,
    TrustlineCreated,
    TrustlineRemoved,
    TrustlineUpdated,
    TrustlineAuthorized,
    TrustlineDeauthorized,
    Trade,
    DataCreated,
    DataRemoved,
    DataUpdated,
    SequenceBumped,
}

impl EffectType {
    pub const ALL: [EffectType; 21] = [
        EffectType::AccountCreated,
        EffectType::AccountRemoved,
        EffectType::AccountCredited,
        EffectType::AccountDebited,
        EffectType::AccountThresholdsUpdated,
        EffectType::AccountHomeDomainUpdated,
        EffectType::AccountFlagsUpdated,
        EffectType::AccountInflationDestinationUpdated,
        EffectType::SignerCreated,
        EffectType::SignerRemoved,
        EffectType::SignerUpdated,
        EffectType::TrustlineCreated,
        EffectType::TrustlineRemoved,
        EffectType::TrustlineUpdated,
        EffectType::TrustlineAuthorized,
        EffectType::TrustlineDeauthorized,
        EffectType::Trade,
        EffectType::DataCreated,
        EffectType::DataRemoved,
        EffectType::DataUpdated,
        EffectType::SequenceBumped,
    ];

    pub fn code(self) -> i32 {
        match self {
            EffectType::AccountCreated => 0,
            EffectType::AccountRemoved => 1,
            EffectType::AccountCredited => 2,
            EffectType::AccountDebited => 3,
            EffectType::AccountThresholdsUpdated => 4,
            EffectType::AccountHomeDomainUpdated => 5,
            EffectType::AccountFlagsUpdated => 6,
            EffectType::AccountInflationDestinationUpdated => 7,
            EffectType::SignerCreated => 10,
            EffectType::SignerRemoved => 11,
            EffectType::SignerUpdated => 12,
            EffectType::TrustlineCreated => 20,
            EffectType::TrustlineRemoved => 21,
            EffectType::TrustlineUpdated => 22,
            EffectType::TrustlineAuthorized => 23,
            EffectType::TrustlineDeauthorized => 24,
            EffectType::Trade => 33,
            EffectType::DataCreated => 40,
            EffectType::DataRemoved => 41,
            EffectType::DataUpdated => 42,
            EffectType::SequenceBumped => 43,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectType::AccountCreated => "account_created",
            EffectType::AccountRemoved => "account_removed",
            EffectType::AccountCredited => "account_credited",
            EffectType::AccountDebited => "account_debited",
            EffectType::AccountThresholdsUpdated => "account_thresholds_updated",
            EffectType::AccountHomeDomainUpdated => "account_home_domain_updated",
            EffectType::AccountFlagsUpdated => "account_flags_updated",
            EffectType::AccountInflationDestinationUpdated => {
                "account_inflation_destination_updated"
            }
            EffectType::SignerCreated => "signer_created",
            EffectType::SignerRemoved => "signer_removed",
            EffectType::SignerUpdated => "signer_updated",
            EffectType::TrustlineCreated => "trustline_created",
            EffectType::TrustlineRemoved => "trustline_removed",
            EffectType::TrustlineUpdated => "trustline_updated",
            EffectType::TrustlineAuthorized => "trustline_authorized",
            EffectType::TrustlineDeauthorized => "trustline_deauthorized",
            EffectType::Trade => "trade",
            EffectType::DataCreated => "data_created",
            EffectType::DataRemoved => "data_removed",
            EffectType::DataUpdated => "data_updated",
            EffectType::SequenceBumped => "sequence_bumped",
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Destination of derived effects.
pub trait EffectSink {
    fn effect(
        &mut self,
        account: &AccountId,
        operation_id: i64,
        order: u32,
        effect: EffectType,
        details: Value,
    ) -> IngestResult<()>;
}

/// An effect collected in memory.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectRecord {
    pub account: AccountId,
    pub operation_id: i64,
    pub order: u32,
    pub effect: EffectType,
    pub details: Value,
}

impl EffectSink for Vec<EffectRecord> {
    fn effect(
        &mut self,
        account: &AccountId,
        operation_id: i64,
        order: u32,
        effect: EffectType,
        details: Value,
    ) -> IngestResult<()> {
        self.push(EffectRecord {
            account: *account,
            operation_id,
            order,
            effect,
            details,
        });
        Ok(())
    }
}

/// Numbers the effects of one operation and forwards them to a sink.
///
/// The first failed add is kept; later adds become no-ops, and
/// [`EffectIngestion::finish`] hands the failure back.
pub struct EffectIngestion<'s, S: EffectSink + ?Sized> {
    sink: &'s mut S,
    operation_id: i64,
    order: u32,
    err: Option<IngestError>,
}

impl<'s, S: EffectSink + ?Sized> EffectIngestion<'s, S> {
    pub fn new(sink: &'s mut S, operation_id: i64) -> Self {
        Self {
            sink,
            operation_id,
            order: 0,
            err: None,
        }
    }

    pub fn add(&mut self, account: &AccountId, effect: EffectType, details: Value) {
        if self.err.is_some() {
            return;
        }
        self.order += 1;
        if let Err(e) = self
            .sink
            .effect(account, self.operation_id, self.order, effect, details)
        {
            self.err = Some(e);
        }
    }

    /// Effects added so far.
    pub fn count(&self) -> u32 {
        self.order
    }

    pub fn finish(&mut self) -> IngestResult<()> {
        match self.err.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn amount_details(amount: i64, asset: &Asset) -> Value {
    let mut details = json!({ "amount": format_amount(amount) });
    asset_details(&mut details, asset, "");
    details
}

/// Derive the effects of one operation of a successful transaction.
///
/// Returns an error when the result arm does not fit the operation. Sink
/// failures are left in `effects` for the caller's `finish`.
pub fn ingest_effects<S: EffectSink + ?Sized>(
    view: &OperationView<'_>,
    effects: &mut EffectIngestion<'_, S>,
) -> IngestResult<()> {
    let source = view.source;

    match &view.operation.body {
        OperationBody::CreateAccount(op) => {
            effects.add(
                &op.destination,
                EffectType::AccountCreated,
                json!({ "starting_balance": format_amount(op.starting_balance) }),
            );
            effects.add(
                &source,
                EffectType::AccountDebited,
                amount_details(op.starting_balance, &Asset::Native),
            );
            effects.add(
                &op.destination,
                EffectType::SignerCreated,
                json!({ "public_key": op.destination.address(), "weight": 1 }),
            );
        }
        OperationBody::Payment(op) => {
            let details = amount_details(op.amount, &op.asset);
            effects.add(&op.destination, EffectType::AccountCredited, details.clone());
            effects.add(&source, EffectType::AccountDebited, details);
        }
        OperationBody::PathPaymentStrictReceive(op) => {
            let result = results::path_payment_success(view)?;
            effects.add(
                &op.destination,
                EffectType::AccountCredited,
                amount_details(op.dest_amount, &op.dest_asset),
            );
            effects.add(
                &source,
                EffectType::AccountDebited,
                amount_details(result.send_amount(), &op.send_asset),
            );
            ingest_trade_effects(effects, &source, &result.offers);
        }
        OperationBody::PathPaymentStrictSend(op) => {
            let result = results::path_payment_success(view)?;
            effects.add(
                &op.destination,
                EffectType::AccountCredited,
                amount_details(result.dest_amount(), &op.dest_asset),
            );
            effects.add(
                &source,
                EffectType::AccountDebited,
                amount_details(op.send_amount, &op.send_asset),
            );
            ingest_trade_effects(effects, &source, &result.offers);
        }
        OperationBody::ManageSellOffer(_)
        | OperationBody::ManageBuyOffer(_)
        | OperationBody::CreatePassiveSellOffer(_) => {
            let result = results::offer_success(view)?;
            ingest_trade_effects(effects, &source, &result.offers_claimed);
        }
        OperationBody::SetOptions(op) => {
            ingest_set_options_effects(view, effects, op);
        }
        OperationBody::ChangeTrust(op) => {
            let key = LedgerKey::trustline(source, op.line.clone());
            // Trusting yourself succeeds without touching the ledger.
            let Some(change) = view.before_and_after(&key) else {
                return Ok(());
            };
            let mut details = json!({ "limit": format_amount(op.limit) });
            asset_details(&mut details, &op.line, "");
            let effect = match change.kind()? {
                ChangeKind::Created => EffectType::TrustlineCreated,
                ChangeKind::Removed => EffectType::TrustlineRemoved,
                ChangeKind::Updated => EffectType::TrustlineUpdated,
            };
            effects.add(&source, effect, details);
        }
        OperationBody::AllowTrust(op) => {
            let mut details = json!({ "trustor": op.trustor.address() });
            asset_details(&mut details, &op.asset(source), "");
            let effect = if op.authorize {
                EffectType::TrustlineAuthorized
            } else {
                EffectType::TrustlineDeauthorized
            };
            effects.add(&source, effect, details);
        }
        OperationBody::AccountMerge(dest) => {
            let balance = results::merged_balance(view)?;
            let details = amount_details(balance, &Asset::Native);
            effects.add(&source, EffectType::AccountDebited, details.clone());
            effects.add(dest, EffectType::AccountCredited, details);
            effects.add(&source, EffectType::AccountRemoved, json!({}));
        }
        OperationBody::Inflation => {
            for payout in results::inflation_payouts(view)? {
                effects.add(
                    &payout.destination,
                    EffectType::AccountCredited,
                    amount_details(payout.amount, &Asset::Native),
                );
            }
        }
        OperationBody::ManageData(op) => {
            let key = LedgerKey::data(source, op.name.clone());
            let change = view
                .before_and_after(&key)
                .ok_or(IngestError::MissingChange {
                    operation_id: view.operation_id,
                    entry_type: key.entry_type(),
                })?;
            let mut details = json!({ "name": op.name });
            if let Some(data) = change.post.as_ref().and_then(|e| e.as_data()) {
                details["value"] = json!(STANDARD.encode(&data.value));
            }
            let effect = match change.kind()? {
                ChangeKind::Created => EffectType::DataCreated,
                ChangeKind::Removed => EffectType::DataRemoved,
                ChangeKind::Updated => EffectType::DataUpdated,
            };
            effects.add(&source, effect, details);
        }
        OperationBody::BumpSequence(op) => {
            if !view.changes.is_empty() {
                effects.add(
                    &source,
                    EffectType::SequenceBumped,
                    json!({ "new_seq": op.bump_to }),
                );
            }
        }
    }
    Ok(())
}

/// One `trade` effect for each side of every non-empty claim.
pub fn ingest_trade_effects<S: EffectSink + ?Sized>(
    effects: &mut EffectIngestion<'_, S>,
    buyer: &AccountId,
    claims: &[ClaimOfferAtom],
) {
    for claim in claims.iter().filter(|c| !c.is_empty()) {
        let mut buyer_details = json!({
            "offer_id": claim.offer_id,
            "seller": claim.seller_id.address(),
            "bought_amount": format_amount(claim.amount_sold),
            "sold_amount": format_amount(claim.amount_bought),
        });
        asset_details(&mut buyer_details, &claim.asset_sold, "bought_");
        asset_details(&mut buyer_details, &claim.asset_bought, "sold_");

        let mut seller_details = json!({
            "offer_id": claim.offer_id,
            "seller": buyer.address(),
            "bought_amount": format_amount(claim.amount_bought),
            "sold_amount": format_amount(claim.amount_sold),
        });
        asset_details(&mut seller_details, &claim.asset_bought, "bought_");
        asset_details(&mut seller_details, &claim.asset_sold, "sold_");

        effects.add(buyer, EffectType::Trade, buyer_details);
        effects.add(&claim.seller_id, EffectType::Trade, seller_details);
    }
}

fn ingest_set_options_effects<S: EffectSink + ?Sized>(
    view: &OperationView<'_>,
    effects: &mut EffectIngestion<'_, S>,
    op: &SetOptionsOp,
) {
    let source = view.source;

    if let Some(domain) = &op.home_domain {
        effects.add(
            &source,
            EffectType::AccountHomeDomainUpdated,
            json!({ "home_domain": domain }),
        );
    }

    let mut thresholds = json!({});
    for (name, value) in [
        ("low_threshold", op.low_threshold),
        ("med_threshold", op.med_threshold),
        ("high_threshold", op.high_threshold),
    ] {
        if let Some(value) = value {
            thresholds[name] = json!(value);
        }
    }
    if thresholds.as_object().is_some_and(|m| !m.is_empty()) {
        effects.add(&source, EffectType::AccountThresholdsUpdated, thresholds);
    }

    let mut flags = json!({});
    if let Some(set) = op.set_flags {
        auth_flag_details(&mut flags, set, true);
    }
    if let Some(clear) = op.clear_flags {
        auth_flag_details(&mut flags, clear, false);
    }
    if flags.as_object().is_some_and(|m| !m.is_empty()) {
        effects.add(&source, EffectType::AccountFlagsUpdated, flags);
    }

    if let Some(dest) = &op.inflation_dest {
        effects.add(
            &source,
            EffectType::AccountInflationDestinationUpdated,
            json!({ "inflation_destination": dest.address() }),
        );
    }

    ingest_signer_effects(view, effects);
}

fn auth_flag_details(details: &mut Value, flags: u32, value: bool) {
    for (bit, name) in [
        (AUTH_REQUIRED_FLAG, "auth_required_flag"),
        (AUTH_REVOCABLE_FLAG, "auth_revocable_flag"),
        (AUTH_IMMUTABLE_FLAG, "auth_immutable_flag"),
    ] {
        if flags & bit != 0 {
            details[name] = json!(value);
        }
    }
}

/// Signer changes, as the difference between the source account's signer
/// sets before and after the operation: removals, then updates, then
/// additions. Once the sets differ at all, every signer present on both
/// sides is reported as updated with its new weight.
fn ingest_signer_effects<S: EffectSink + ?Sized>(
    view: &OperationView<'_>,
    effects: &mut EffectIngestion<'_, S>,
) {
    let source = view.source;
    let Some(change) = view.before_and_after(&LedgerKey::account(source)) else {
        return;
    };
    let (Some(before), Some(after)) = (
        change.pre.as_ref().and_then(|e| e.as_account()),
        change.post.as_ref().and_then(|e| e.as_account()),
    ) else {
        return;
    };
    let before = before.signer_summary();
    let after = after.signer_summary();
    let weight_in = |summary: &[(String, u32)], key: &str| {
        summary.iter().find(|(k, _)| k == key).map(|(_, w)| *w)
    };
    let unchanged = before.len() == after.len()
        && before.iter().all(|(key, w)| weight_in(&after, key) == Some(*w));
    if unchanged {
        return;
    }

    for (key, _) in &before {
        if weight_in(&after, key).is_none() {
            effects.add(&source, EffectType::SignerRemoved, json!({ "public_key": key }));
        }
    }
    for (key, _) in &before {
        if let Some(weight) = weight_in(&after, key) {
            effects.add(
                &source,
                EffectType::SignerUpdated,
                json!({ "public_key": key, "weight": weight }),
            );
        }
    }
    for (key, weight) in &after {
        if weight_in(&before, key).is_none() {
            effects.add(
                &source,
                EffectType::SignerCreated,
                json!({ "public_key": key, "weight": weight }),
            );
        }
    }
}
