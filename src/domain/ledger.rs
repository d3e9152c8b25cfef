use std::collections::HashMap;

use super::{Account, AccountId, Credits, Transaction};

/// Recompute a balance from transaction history.
/// A committed ledger always satisfies
/// `balance_from_history(&history) == account.balance`.
pub fn balance_from_history(transactions: &[Transaction]) -> Credits {
    transactions.iter().map(|tx| tx.amount).sum()
}

/// One account whose stored balance disagrees with its ledger sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDrift {
    pub account_id: AccountId,
    pub label: String,
    pub balance: Credits,
    pub ledger_sum: Credits,
}

/// Result of an audit pass over the whole store.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub account_count: i64,
    pub transaction_count: i64,
    /// Ledger rows with a zero amount (the schema forbids them; any hit
    /// means the database was edited outside this crate).
    pub zero_amount_rows: i64,
    /// Ledger rows whose account no longer exists.
    pub orphaned_rows: i64,
    pub drifts: Vec<BalanceDrift>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.drifts.is_empty() && self.zero_amount_rows == 0 && self.orphaned_rows == 0
    }
}

/// Compare stored balances against per-account ledger sums.
/// Accounts with no history must hold a zero balance.
pub fn build_audit_report(
    accounts: &[Account],
    ledger_sums: &HashMap<AccountId, Credits>,
    transaction_count: i64,
    zero_amount_rows: i64,
    orphaned_rows: i64,
) -> AuditReport {
    let drifts = accounts
        .iter()
        .filter_map(|account| {
            let ledger_sum = ledger_sums.get(&account.id).copied().unwrap_or(0);
            (ledger_sum != account.balance).then(|| BalanceDrift {
                account_id: account.id,
                label: account.label.clone(),
                balance: account.balance,
                ledger_sum,
            })
        })
        .collect();

    AuditReport {
        account_count: accounts.len() as i64,
        transaction_count,
        zero_amount_rows,
        orphaned_rows,
        drifts,
    }
}
