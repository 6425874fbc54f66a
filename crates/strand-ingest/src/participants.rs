//! Accounts that take part in a transaction or operation.

use strand_source::Transaction;
use strand_types::{AccountId, LedgerEntryChange, LedgerKey, Operation, OperationBody};

fn push_unique(accounts: &mut Vec<AccountId>, account: AccountId) {
    if !accounts.contains(&account) {
        accounts.push(account);
    }
}

/// The operation's effective source plus every account its body names as
/// a counterparty, in first-seen order.
pub fn for_operation(tx: &Transaction, operation: &Operation) -> Vec<AccountId> {
    let mut accounts = vec![tx.operation_source(operation)];
    let named = match &operation.body {
        OperationBody::CreateAccount(op) => Some(op.destination),
        OperationBody::Payment(op) => Some(op.destination),
        OperationBody::PathPaymentStrictReceive(op) => Some(op.destination),
        OperationBody::PathPaymentStrictSend(op) => Some(op.destination),
        OperationBody::AllowTrust(op) => Some(op.trustor),
        OperationBody::AccountMerge(dest) => Some(*dest),
        _ => None,
    };
    if let Some(account) = named {
        push_unique(&mut accounts, account);
    }
    accounts
}

/// Account entries touched by a list of changes.
fn for_changes<'a>(
    changes: impl Iterator<Item = &'a LedgerEntryChange>,
    accounts: &mut Vec<AccountId>,
) {
    for change in changes {
        if let LedgerKey::Account { account_id } = change.ledger_key() {
            push_unique(accounts, account_id);
        }
    }
}

/// The transaction source, every account whose entry the transaction or its
/// fee touched, and every operation's participants.
pub fn for_transaction(tx: &Transaction) -> Vec<AccountId> {
    let mut accounts = vec![tx.source_account()];
    for_changes(tx.meta.all_changes(), &mut accounts);
    for_changes(tx.fee_changes.iter(), &mut accounts);
    for operation in &tx.envelope.operations {
        for account in for_operation(tx, operation) {
            push_unique(&mut accounts, account);
        }
    }
    accounts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use strand_types::{
        AllowTrustOp, Asset, BumpSequenceOp, PaymentOp, TransactionResultCode,
    };

    #[test]
    fn operation_participants() {
        let dest = AccountId::from_seed("dest");
        let other = AccountId::from_seed("other");
        let mut payment = op(OperationBody::Payment(PaymentOp {
            destination: dest,
            asset: Asset::Native,
            amount: 1,
        }));
        let self_payment = op(OperationBody::Payment(PaymentOp {
            destination: source(),
            asset: Asset::Native,
            amount: 1,
        }));
        let fixture = Fixture::new(
            vec![payment.clone(), self_payment.clone()],
            vec![None, None],
            vec![vec![], vec![]],
            TransactionResultCode::Success,
        );
        assert_eq!(for_operation(&fixture.tx, &payment), vec![source(), dest]);
        assert_eq!(for_operation(&fixture.tx, &self_payment), vec![source()]);

        payment.source_account = Some(other);
        assert_eq!(for_operation(&fixture.tx, &payment), vec![other, dest]);
    }

    #[test]
    fn transaction_participants_include_touched_accounts() {
        let trustor = AccountId::from_seed("trustor");
        let touched = AccountId::from_seed("touched");
        let fee_payer = AccountId::from_seed("fee");
        let mut fixture = Fixture::new(
            vec![
                op(OperationBody::AllowTrust(AllowTrustOp {
                    trustor,
                    asset_code: "USD".into(),
                    authorize: true,
                })),
                op(OperationBody::BumpSequence(BumpSequenceOp { bump_to: 4 })),
            ],
            vec![None, None],
            vec![
                vec![],
                vec![LedgerEntryChange::Updated(account_entry(touched, 1, vec![]))],
            ],
            TransactionResultCode::Success,
        );
        fixture.tx.fee_changes = vec![LedgerEntryChange::Removed(LedgerKey::account(fee_payer))];
        assert_eq!(
            for_transaction(&fixture.tx),
            vec![source(), touched, fee_payer, trustor]
        );
    }
}
