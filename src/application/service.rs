use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    balance_from_history, build_audit_report, Account, AccountId, AuditReport, BalanceDrift,
    Credits, HistoryOrder, Transaction, TransactionKind,
};
use crate::storage::Store;

use super::LedgerError;

/// Application service providing high-level operations for the credit
/// ledger. This is the primary interface for any client (CLI, API, TUI).
pub struct CreditLedger {
    store: Store,
}

/// Result of applying a transaction: the ledger row that was appended and
/// the balance it left behind.
#[derive(Debug)]
pub struct AppliedTransaction {
    pub transaction: Transaction,
    pub balance: Credits,
}

/// Detailed account information
#[derive(Debug)]
pub struct AccountInfo {
    pub account: Account,
    pub transaction_count: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Filter for querying account history
#[derive(Default)]
pub struct HistoryFilter {
    pub kind: Option<TransactionKind>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub order: HistoryOrder,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl CreditLedger {
    /// Create a new service with the given store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, LedgerError> {
        let store = Store::init(database_path).await?;
        Ok(Self::new(store))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, LedgerError> {
        let store = Store::connect(database_path).await?;
        Ok(Self::new(store))
    }

    // ========================
    // Account operations
    // ========================

    /// Create a new account with a zero balance.
    pub async fn create_account(&self, label: String) -> Result<Account, LedgerError> {
        // Check if the label is already taken
        if self.store.get_account_by_label(&label).await?.is_some() {
            return Err(LedgerError::AccountAlreadyExists(label));
        }

        let account = Account::new(label);
        self.store.save_account(&account).await?;

        tracing::debug!(account_id = %account.id, label = %account.label, "account created");
        Ok(account)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .get_account(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Resolve an account from a label or an ID string.
    pub async fn find_account(&self, handle: &str) -> Result<Account, LedgerError> {
        if let Ok(id) = Uuid::parse_str(handle) {
            if let Some(account) = self.store.get_account(id).await? {
                return Ok(account);
            }
        }

        self.store
            .get_account_by_label(handle)
            .await?
            .ok_or_else(|| LedgerError::NotFound(handle.to_string()))
    }

    /// Get detailed account information.
    pub async fn account_info(&self, handle: &str) -> Result<AccountInfo, LedgerError> {
        let account = self.find_account(handle).await?;
        let transaction_count = self.store.count_transactions(account.id).await?;
        let last_activity = self.store.last_activity(account.id).await?;

        Ok(AccountInfo {
            account,
            transaction_count,
            last_activity,
        })
    }

    /// List all accounts.
    pub async fn list_accounts(&self, include_closed: bool) -> Result<Vec<Account>, LedgerError> {
        self.store.list_accounts(include_closed).await
    }

    /// Close an account. Closed accounts keep their balance and history
    /// and still accept transactions; closing only hides them from the
    /// default account listing.
    pub async fn close_account(&self, handle: &str) -> Result<Account, LedgerError> {
        let account = self.find_account(handle).await?;
        if account.is_closed() {
            return Err(LedgerError::AccountClosed(account.label));
        }

        let now = Utc::now();
        self.store.close_account(account.id, now).await?;

        Ok(Account {
            closed_at: Some(now),
            ..account
        })
    }

    /// Reopen a closed account. Reopening an open account is a no-op.
    pub async fn reopen_account(&self, handle: &str) -> Result<Account, LedgerError> {
        let account = self.find_account(handle).await?;
        if !account.is_closed() {
            return Ok(account);
        }

        self.store.reopen_account(account.id).await?;

        Ok(Account {
            closed_at: None,
            ..account
        })
    }

    // ========================
    // Ledger operations
    // ========================

    /// Apply a signed credit adjustment to an account.
    ///
    /// The balance change and the ledger row commit together or not at
    /// all. The sign of `amount` decides whether credits are added or
    /// removed; `kind` is a caller-supplied tag and never changes the
    /// arithmetic. A debit that would push the balance below zero is
    /// rejected with `InsufficientBalance` and leaves no trace.
    pub async fn apply(
        &self,
        account_id: AccountId,
        amount: Credits,
        kind: TransactionKind,
        description: Option<String>,
    ) -> Result<AppliedTransaction, LedgerError> {
        // Validate amount before touching storage
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(
                "Amount must be non-zero".to_string(),
            ));
        }

        let (balance, transaction) = self
            .store
            .apply_transaction(account_id, amount, kind, description.as_deref())
            .await?;

        tracing::debug!(
            account_id = %account_id,
            transaction_id = transaction.id,
            amount,
            kind = %kind,
            balance,
            "transaction applied"
        );

        Ok(AppliedTransaction {
            transaction,
            balance,
        })
    }

    /// Read the authoritative balance for an account.
    pub async fn current_balance(&self, account_id: AccountId) -> Result<Credits, LedgerError> {
        self.store.current_balance(account_id).await
    }

    /// List all transactions for an account.
    pub async fn list_transactions(
        &self,
        account_id: AccountId,
        order: HistoryOrder,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.get_account(account_id).await?;
        self.store.list_transactions(account_id, order).await
    }

    /// List transactions for an account with filters and paging.
    pub async fn list_transactions_filtered(
        &self,
        account_id: AccountId,
        filter: HistoryFilter,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.get_account(account_id).await?;
        self.store
            .list_transactions_filtered(
                account_id,
                filter.kind,
                filter.from_date,
                filter.to_date,
                filter.order,
                filter.limit,
                filter.offset,
            )
            .await
    }

    // ========================
    // Audit operations
    // ========================

    /// Check one account's stored balance against its full transaction
    /// history, returning the drift if they disagree.
    pub async fn verify_account(&self, handle: &str) -> Result<Option<BalanceDrift>, LedgerError> {
        let account = self.find_account(handle).await?;
        let history = self
            .store
            .list_transactions(account.id, HistoryOrder::OldestFirst)
            .await?;
        let ledger_sum = balance_from_history(&history);

        Ok((ledger_sum != account.balance).then(|| BalanceDrift {
            account_id: account.id,
            label: account.label,
            balance: account.balance,
            ledger_sum,
        }))
    }

    /// Check that every stored balance equals the sum of its ledger rows.
    pub async fn verify(&self) -> Result<AuditReport, LedgerError> {
        let accounts = self.store.list_accounts(true).await?;
        let sums = self.store.ledger_sums().await?;
        let (transaction_count, zero_amount_rows, orphaned_rows) =
            self.store.audit_counts().await?;

        let report = build_audit_report(
            &accounts,
            &sums,
            transaction_count,
            zero_amount_rows,
            orphaned_rows,
        );

        if !report.is_clean() {
            tracing::warn!(
                drifts = report.drifts.len(),
                zero_amount_rows = report.zero_amount_rows,
                orphaned_rows = report.orphaned_rows,
                "ledger audit found inconsistencies"
            );
        }

        Ok(report)
    }
}
