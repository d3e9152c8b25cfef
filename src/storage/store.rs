use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::application::LedgerError;
use crate::domain::{Account, AccountId, Credits, HistoryOrder, Transaction, TransactionKind};

use super::MIGRATION_001_INITIAL;

/// SQLite-backed store for accounts and their transaction ledger.
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open an existing database at the given path.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let pool = SqlitePool::connect_with(connect_options(path.as_ref(), false))
            .await
            .map_err(|err| storage_error(err, "open credit ledger database"))?;
        Ok(Self::new(pool))
    }

    /// Create the database file if needed and run migrations.
    pub async fn init(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let pool = SqlitePool::connect_with(connect_options(path.as_ref(), true))
            .await
            .map_err(|err| storage_error(err, "create credit ledger database"))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .map_err(|err| storage_error(err, "run migration 001"))?;
        Ok(())
    }

    // ========================
    // Account operations
    // ========================

    /// Save a new account to the database.
    pub async fn save_account(&self, account: &Account) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, label, balance, created_at, closed_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.label)
        .bind(account.balance)
        .bind(format_timestamp(account.created_at))
        .bind(account.closed_at.map(format_timestamp))
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                LedgerError::AccountAlreadyExists(account.label.clone())
            }
            _ => storage_error(err, "save account"),
        })?;
        Ok(())
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, label, balance, created_at, closed_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| storage_error(err, "fetch account"))?;

        match row {
            Some(row) => Ok(Some(row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Get an account by label.
    pub async fn get_account_by_label(&self, label: &str) -> Result<Option<Account>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, label, balance, created_at, closed_at
            FROM accounts
            WHERE label = ?
            "#,
        )
        .bind(label)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| storage_error(err, "fetch account by label"))?;

        match row {
            Some(row) => Ok(Some(row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// List all accounts (optionally including closed ones).
    pub async fn list_accounts(&self, include_closed: bool) -> Result<Vec<Account>, LedgerError> {
        let query = if include_closed {
            "SELECT id, label, balance, created_at, closed_at FROM accounts ORDER BY label"
        } else {
            "SELECT id, label, balance, created_at, closed_at FROM accounts WHERE closed_at IS NULL ORDER BY label"
        };

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| storage_error(err, "list accounts"))?;

        rows.iter().map(row_to_account).collect()
    }

    /// Mark an account as closed.
    pub async fn close_account(&self, id: AccountId, at: DateTime<Utc>) -> Result<(), LedgerError> {
        sqlx::query("UPDATE accounts SET closed_at = ? WHERE id = ?")
            .bind(format_timestamp(at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| storage_error(err, "close account"))?;
        Ok(())
    }

    /// Clear the closed marker on an account.
    pub async fn reopen_account(&self, id: AccountId) -> Result<(), LedgerError> {
        sqlx::query("UPDATE accounts SET closed_at = NULL WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|err| storage_error(err, "reopen account"))?;
        Ok(())
    }

    /// Read the authoritative balance for an account.
    pub async fn current_balance(&self, id: AccountId) -> Result<Credits, LedgerError> {
        let row = sqlx::query("SELECT balance FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| storage_error(err, "read balance"))?;

        match row {
            Some(row) => Ok(row.get("balance")),
            None => Err(LedgerError::NotFound(id.to_string())),
        }
    }

    // ========================
    // Ledger operations
    // ========================

    /// Adjust an account balance and append the matching ledger row in one
    /// transaction. Both writes commit together or not at all. The balance
    /// update runs first and conditionally, so concurrent applies on the
    /// same account serialize on the row and a debit past zero never lands.
    pub async fn apply_transaction(
        &self,
        account_id: AccountId,
        amount: Credits,
        kind: TransactionKind,
        description: Option<&str>,
    ) -> Result<(Credits, Transaction), LedgerError> {
        let account_id_str = account_id.to_string();
        let created_at = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| storage_error(err, "begin apply transaction"))?;

        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + ?
            WHERE id = ? AND balance + ? >= 0
            RETURNING balance
            "#,
        )
        .bind(amount)
        .bind(&account_id_str)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| storage_error(err, "adjust balance"))?;

        let new_balance: Credits = match updated {
            Some(row) => row.get("balance"),
            None => {
                // No row matched: the account is missing, or the adjustment
                // would take the balance below zero. Look again to tell the
                // two apart. Dropping tx rolls the unit of work back.
                let row = sqlx::query("SELECT balance FROM accounts WHERE id = ?")
                    .bind(&account_id_str)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|err| storage_error(err, "read balance"))?;

                return match row {
                    Some(row) => Err(LedgerError::InsufficientBalance {
                        account: account_id,
                        balance: row.get("balance"),
                        amount,
                    }),
                    None => Err(LedgerError::NotFound(account_id.to_string())),
                };
            }
        };

        let row = sqlx::query(
            r#"
            INSERT INTO transactions (account_id, amount, kind, description, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&account_id_str)
        .bind(amount)
        .bind(kind.as_str())
        .bind(description)
        .bind(format_timestamp(created_at))
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| storage_error(err, "append ledger row"))?;

        let transaction = Transaction {
            id: row.get("id"),
            account_id,
            amount,
            kind,
            description: description.map(str::to_owned),
            created_at,
        };

        tx.commit()
            .await
            .map_err(|err| storage_error(err, "commit apply transaction"))?;

        Ok((new_balance, transaction))
    }

    /// List all transactions for an account.
    pub async fn list_transactions(
        &self,
        account_id: AccountId,
        order: HistoryOrder,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let query = format!(
            "SELECT id, account_id, amount, kind, description, created_at FROM transactions WHERE account_id = ? {}",
            order_clause(order)
        );

        let rows = sqlx::query(&query)
            .bind(account_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|err| storage_error(err, "list transactions"))?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// List transactions for an account with optional filters and paging.
    pub async fn list_transactions_filtered(
        &self,
        account_id: AccountId,
        kind: Option<TransactionKind>,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
        order: HistoryOrder,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        // Build query dynamically based on filters
        let mut query = String::from(
            "SELECT id, account_id, amount, kind, description, created_at FROM transactions WHERE account_id = ?",
        );

        let from_date_str = from_date.map(format_timestamp);
        let to_date_str = to_date.map(format_timestamp);

        if kind.is_some() {
            query.push_str(" AND kind = ?");
        }
        if from_date_str.is_some() {
            query.push_str(" AND created_at >= ?");
        }
        if to_date_str.is_some() {
            query.push_str(" AND created_at <= ?");
        }

        query.push(' ');
        query.push_str(order_clause(order));

        match (limit, offset) {
            (Some(limit), Some(offset)) => {
                query.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
            }
            (Some(limit), None) => query.push_str(&format!(" LIMIT {}", limit)),
            // SQLite only accepts OFFSET after a LIMIT; -1 means no cap.
            (None, Some(offset)) => query.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        let mut sql_query = sqlx::query(&query).bind(account_id.to_string());

        if let Some(kind) = kind {
            sql_query = sql_query.bind(kind.as_str());
        }
        if let Some(ref fd_str) = from_date_str {
            sql_query = sql_query.bind(fd_str);
        }
        if let Some(ref td_str) = to_date_str {
            sql_query = sql_query.bind(td_str);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .map_err(|err| storage_error(err, "list filtered transactions"))?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// Count ledger rows for an account.
    pub async fn count_transactions(&self, account_id: AccountId) -> Result<i64, LedgerError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM transactions WHERE account_id = ?")
            .bind(account_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|err| storage_error(err, "count account transactions"))?;

        Ok(row.get("count"))
    }

    /// Get the most recent transaction timestamp for an account.
    pub async fn last_activity(
        &self,
        account_id: AccountId,
    ) -> Result<Option<DateTime<Utc>>, LedgerError> {
        let row = sqlx::query(
            "SELECT MAX(created_at) as last_activity FROM transactions WHERE account_id = ?",
        )
        .bind(account_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| storage_error(err, "read last activity"))?;

        let last_activity: Option<String> = row.get("last_activity");
        match last_activity {
            Some(raw) => Ok(Some(parse_timestamp(&raw)?)),
            None => Ok(None),
        }
    }

    // ========================
    // Audit operations
    // ========================

    /// Sum ledger amounts per account in a single query.
    /// Accounts with no transactions won't be in the map.
    pub async fn ledger_sums(&self) -> Result<HashMap<AccountId, Credits>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT account_id, SUM(amount) as ledger_sum
            FROM transactions
            GROUP BY account_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| storage_error(err, "sum ledger amounts"))?;

        let mut sums = HashMap::new();
        for row in rows {
            let account_id_str: String = row.get("account_id");
            let account_id = Uuid::parse_str(&account_id_str)
                .map_err(|err| corrupt_row(err, "invalid account id in ledger row"))?;
            sums.insert(account_id, row.get("ledger_sum"));
        }

        Ok(sums)
    }

    /// Counts for integrity checking: total ledger rows, rows with a zero
    /// amount, and rows pointing at a missing account.
    pub async fn audit_counts(&self) -> Result<(i64, i64, i64), LedgerError> {
        let transaction_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM transactions")
            .fetch_one(&self.pool)
            .await
            .map_err(|err| storage_error(err, "count transactions"))?
            .get("count");

        let zero_amount_rows: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM transactions WHERE amount = 0")
                .fetch_one(&self.pool)
                .await
                .map_err(|err| storage_error(err, "count zero amount rows"))?
                .get("count");

        let orphaned_rows: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM transactions t
            WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = t.account_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|err| storage_error(err, "count orphaned rows"))?
        .get("count");

        Ok((transaction_count, zero_amount_rows, orphaned_rows))
    }
}

fn connect_options(path: &Path, create_if_missing: bool) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create_if_missing)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true)
}

/// Fixed-width timestamps so lexicographic order in SQL matches
/// chronological order.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, LedgerError> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|err| corrupt_row(err, "invalid timestamp in database"))?
        .with_timezone(&Utc))
}

fn order_clause(order: HistoryOrder) -> &'static str {
    match order {
        HistoryOrder::OldestFirst => "ORDER BY created_at ASC, id ASC",
        HistoryOrder::NewestFirst => "ORDER BY created_at DESC, id DESC",
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes,
/// mean another writer held the database past the busy timeout.
fn is_busy_or_locked(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };
    db_err
        .code()
        .and_then(|code| code.parse::<i64>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}

fn storage_error(err: sqlx::Error, context: &'static str) -> LedgerError {
    if is_busy_or_locked(&err) {
        return LedgerError::ConcurrencyConflict;
    }
    LedgerError::StorageUnavailable(anyhow::Error::new(err).context(context))
}

fn corrupt_row(
    err: impl std::error::Error + Send + Sync + 'static,
    context: &'static str,
) -> LedgerError {
    LedgerError::StorageUnavailable(anyhow::Error::new(err).context(context))
}

fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account, LedgerError> {
    let id_str: String = row.get("id");
    let created_at_str: String = row.get("created_at");
    let closed_at_str: Option<String> = row.get("closed_at");

    let closed_at = match closed_at_str {
        Some(raw) => Some(parse_timestamp(&raw)?),
        None => None,
    };

    Ok(Account {
        id: Uuid::parse_str(&id_str).map_err(|err| corrupt_row(err, "invalid account id"))?,
        label: row.get("label"),
        balance: row.get("balance"),
        created_at: parse_timestamp(&created_at_str)?,
        closed_at,
    })
}

fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction, LedgerError> {
    let account_id_str: String = row.get("account_id");
    let kind_str: String = row.get("kind");
    let created_at_str: String = row.get("created_at");

    Ok(Transaction {
        id: row.get("id"),
        account_id: Uuid::parse_str(&account_id_str)
            .map_err(|err| corrupt_row(err, "invalid account id in ledger row"))?,
        amount: row.get("amount"),
        kind: TransactionKind::from_str(&kind_str).ok_or_else(|| {
            LedgerError::StorageUnavailable(anyhow::anyhow!(
                "unknown transaction kind in ledger row: {kind_str}"
            ))
        })?,
        description: row.get("description"),
        created_at: parse_timestamp(&created_at_str)?,
    })
}
