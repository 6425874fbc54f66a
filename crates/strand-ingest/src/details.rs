//! Per-operation detail payloads for the operations table.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Value};
use strand_types::transaction::{AUTH_IMMUTABLE_FLAG, AUTH_REQUIRED_FLAG, AUTH_REVOCABLE_FLAG};
use strand_types::{format_amount, Asset, OperationBody, Price};

use crate::cursor::OperationView;
use crate::error::IngestResult;
use crate::results;

const FLAG_NAMES: [(u32, &str); 3] = [
    (AUTH_REQUIRED_FLAG, "auth_required"),
    (AUTH_REVOCABLE_FLAG, "auth_revocable"),
    (AUTH_IMMUTABLE_FLAG, "auth_immutable"),
];

/// Add `<prefix>asset_type`, and for credit assets `<prefix>asset_code` and
/// `<prefix>asset_issuer`, to a JSON object.
pub fn asset_details(details: &mut Value, asset: &Asset, prefix: &str) {
    let Some(map) = details.as_object_mut() else {
        return;
    };
    map.insert(format!("{prefix}asset_type"), json!(asset.asset_type()));
    if let Asset::Credit { code, issuer } = asset {
        map.insert(format!("{prefix}asset_code"), json!(code));
        map.insert(format!("{prefix}asset_issuer"), json!(issuer.address()));
    }
}

fn asset_object(asset: &Asset) -> Value {
    let mut value = Value::Object(Map::new());
    asset_details(&mut value, asset, "");
    value
}

fn price_r(price: &Price) -> Value {
    json!({ "n": price.n, "d": price.d })
}

fn flag_details(details: &mut Value, flags: u32, prefix: &str) {
    let named: Vec<(u32, &str)> = FLAG_NAMES
        .iter()
        .copied()
        .filter(|(bit, _)| flags & bit != 0)
        .collect();
    let bits: Vec<u32> = named.iter().map(|(bit, _)| *bit).collect();
    let names: Vec<&str> = named.iter().map(|(_, name)| *name).collect();
    details[format!("{prefix}_flags")] = json!(bits);
    details[format!("{prefix}_flags_s")] = json!(names);
}

/// The detail record stored with an operation row.
///
/// Amounts that only the result knows (path payment source or destination
/// amounts) are read from the result of successful transactions and are
/// zero otherwise.
pub fn operation_details(view: &OperationView<'_>) -> IngestResult<Value> {
    let source = view.source.address();
    let details = match &view.operation.body {
        OperationBody::CreateAccount(op) => json!({
            "funder": source,
            "account": op.destination.address(),
            "starting_balance": format_amount(op.starting_balance),
        }),
        OperationBody::Payment(op) => {
            let mut d = json!({
                "from": source,
                "to": op.destination.address(),
                "amount": format_amount(op.amount),
            });
            asset_details(&mut d, &op.asset, "");
            d
        }
        OperationBody::PathPaymentStrictReceive(op) => {
            let source_amount = if view.successful() {
                results::path_payment_success(view)?.send_amount()
            } else {
                0
            };
            let mut d = json!({
                "from": source,
                "to": op.destination.address(),
                "amount": format_amount(op.dest_amount),
                "source_amount": format_amount(source_amount),
                "source_max": format_amount(op.send_max),
                "path": op.path.iter().map(asset_object).collect::<Vec<_>>(),
            });
            asset_details(&mut d, &op.dest_asset, "");
            asset_details(&mut d, &op.send_asset, "source_");
            d
        }
        OperationBody::PathPaymentStrictSend(op) => {
            let amount = if view.successful() {
                results::path_payment_success(view)?.dest_amount()
            } else {
                0
            };
            let mut d = json!({
                "from": source,
                "to": op.destination.address(),
                "amount": format_amount(amount),
                "source_amount": format_amount(op.send_amount),
                "destination_min": format_amount(op.dest_min),
                "path": op.path.iter().map(asset_object).collect::<Vec<_>>(),
            });
            asset_details(&mut d, &op.dest_asset, "");
            asset_details(&mut d, &op.send_asset, "source_");
            d
        }
        OperationBody::ManageSellOffer(op) => {
            let mut d = json!({
                "offer_id": op.offer_id,
                "amount": format_amount(op.amount),
                "price": op.price.to_string(),
                "price_r": price_r(&op.price),
            });
            asset_details(&mut d, &op.buying, "buying_");
            asset_details(&mut d, &op.selling, "selling_");
            d
        }
        OperationBody::ManageBuyOffer(op) => {
            let mut d = json!({
                "offer_id": op.offer_id,
                "amount": format_amount(op.buy_amount),
                "price": op.price.to_string(),
                "price_r": price_r(&op.price),
            });
            asset_details(&mut d, &op.buying, "buying_");
            asset_details(&mut d, &op.selling, "selling_");
            d
        }
        OperationBody::CreatePassiveSellOffer(op) => {
            let mut d = json!({
                "amount": format_amount(op.amount),
                "price": op.price.to_string(),
                "price_r": price_r(&op.price),
            });
            asset_details(&mut d, &op.buying, "buying_");
            asset_details(&mut d, &op.selling, "selling_");
            d
        }
        OperationBody::SetOptions(op) => {
            let mut d = json!({});
            if let Some(dest) = &op.inflation_dest {
                d["inflation_dest"] = json!(dest.address());
            }
            if let Some(flags) = op.set_flags.filter(|f| *f > 0) {
                flag_details(&mut d, flags, "set");
            }
            if let Some(flags) = op.clear_flags.filter(|f| *f > 0) {
                flag_details(&mut d, flags, "clear");
            }
            if let Some(weight) = op.master_weight {
                d["master_key_weight"] = json!(weight);
            }
            if let Some(t) = op.low_threshold {
                d["low_threshold"] = json!(t);
            }
            if let Some(t) = op.med_threshold {
                d["med_threshold"] = json!(t);
            }
            if let Some(t) = op.high_threshold {
                d["high_threshold"] = json!(t);
            }
            if let Some(domain) = &op.home_domain {
                d["home_domain"] = json!(domain);
            }
            if let Some(signer) = &op.signer {
                d["signer_key"] = json!(signer.key.address());
                d["signer_weight"] = json!(signer.weight);
            }
            d
        }
        OperationBody::ChangeTrust(op) => {
            let mut d = json!({
                "trustor": source,
                "limit": format_amount(op.limit),
            });
            if let Some(issuer) = op.line.issuer() {
                d["trustee"] = json!(issuer.address());
            }
            asset_details(&mut d, &op.line, "");
            d
        }
        OperationBody::AllowTrust(op) => {
            let mut d = json!({
                "trustee": source,
                "trustor": op.trustor.address(),
                "authorize": op.authorize,
            });
            asset_details(&mut d, &op.asset(view.source), "");
            d
        }
        OperationBody::AccountMerge(dest) => json!({
            "account": source,
            "into": dest.address(),
        }),
        OperationBody::Inflation => json!({}),
        OperationBody::ManageData(op) => json!({
            "name": op.name,
            "value": op.value.as_ref().map(|v| STANDARD.encode(v)),
        }),
        OperationBody::BumpSequence(op) => json!({
            "bump_to": op.bump_to.to_string(),
        }),
    };
    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use strand_types::{
        AccountId, ManageDataOp, OpResult, OperationResultTr, PathPaymentStrictReceiveOp,
        PathPaymentSuccess, SetOptionsOp, Signer, SimplePaymentResult, TransactionResultCode,
    };

    #[test]
    fn asset_details_with_prefix() {
        let usd = Asset::credit("USD", AccountId::from_seed("issuer"));
        let mut d = json!({});
        asset_details(&mut d, &usd, "bought_");
        assert_eq!(d["bought_asset_type"], "credit_alphanum4");
        assert_eq!(d["bought_asset_code"], "USD");
        assert_eq!(d["bought_asset_issuer"], AccountId::from_seed("issuer").address());

        let mut native = json!({});
        asset_details(&mut native, &Asset::Native, "");
        assert_eq!(native, json!({"asset_type": "native"}));
    }

    #[test]
    fn set_options_lists_named_flags() {
        let body = OperationBody::SetOptions(SetOptionsOp {
            set_flags: Some(AUTH_REQUIRED_FLAG | AUTH_IMMUTABLE_FLAG),
            clear_flags: Some(0),
            home_domain: Some("example.com".into()),
            signer: Some(Signer {
                key: AccountId::from_seed("cosigner"),
                weight: 3,
            }),
            ..SetOptionsOp::default()
        });
        let result = OperationResultTr::SetOptions(OpResult::Success(()));
        let fixture = Fixture::single(body, Some(result), vec![]);
        let d = operation_details(&fixture.view()).unwrap();
        assert_eq!(d["set_flags"], json!([1, 4]));
        assert_eq!(d["set_flags_s"], json!(["auth_required", "auth_immutable"]));
        assert!(d.get("clear_flags").is_none());
        assert_eq!(d["home_domain"], "example.com");
        assert_eq!(d["signer_weight"], 3);
    }

    #[test]
    fn manage_data_value_is_base64() {
        let body = OperationBody::ManageData(ManageDataOp {
            name: "k".into(),
            value: Some(b"hello".to_vec()),
        });
        let fixture = Fixture::single(body, None, vec![]);
        let d = operation_details(&fixture.view()).unwrap();
        assert_eq!(d, json!({"name": "k", "value": "aGVsbG8="}));
    }

    #[test]
    fn failed_path_payment_has_zero_source_amount() {
        let body = OperationBody::PathPaymentStrictReceive(PathPaymentStrictReceiveOp {
            send_asset: Asset::Native,
            send_max: 50_000_000,
            destination: AccountId::from_seed("dest"),
            dest_asset: Asset::Native,
            dest_amount: 10_000_000,
            path: vec![Asset::credit("EUR", AccountId::from_seed("issuer"))],
        });
        let fixture = Fixture::new(
            vec![op(body.clone())],
            vec![None],
            vec![vec![]],
            TransactionResultCode::Failed,
        );
        let d = operation_details(&fixture.view()).unwrap();
        assert_eq!(d["source_amount"], "0.0000000");
        assert_eq!(d["source_max"], "5.0000000");
        assert_eq!(d["path"][0]["asset_code"], "EUR");

        let result = OperationResultTr::PathPaymentStrictReceive(OpResult::Success(
            PathPaymentSuccess {
                offers: vec![],
                last: SimplePaymentResult {
                    destination: AccountId::from_seed("dest"),
                    asset: Asset::Native,
                    amount: 10_000_000,
                },
            },
        ));
        let fixture = Fixture::single(body, Some(result), vec![]);
        let d = operation_details(&fixture.view()).unwrap();
        assert_eq!(d["source_amount"], "1.0000000");
    }
}
