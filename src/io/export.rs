use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::CreditLedger;
use crate::domain::{Account, HistoryOrder, Transaction};

/// Database snapshot for full export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    ledger: &'a CreditLedger,
}

impl<'a> Exporter<'a> {
    pub fn new(ledger: &'a CreditLedger) -> Self {
        Self { ledger }
    }

    /// Export transaction history to CSV format.
    /// When `account` is given, only that account's history is written.
    pub async fn export_history_csv<W: Write>(
        &self,
        writer: W,
        account: Option<&str>,
    ) -> Result<usize> {
        let accounts = match account {
            Some(handle) => vec![self.ledger.find_account(handle).await?],
            None => self.ledger.list_accounts(true).await?,
        };

        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write header
        csv_writer.write_record(&[
            "id",
            "account",
            "amount",
            "kind",
            "description",
            "created_at",
        ])?;

        let mut count = 0;
        for account in &accounts {
            let transactions = self
                .ledger
                .list_transactions(account.id, HistoryOrder::OldestFirst)
                .await?;

            for tx in &transactions {
                csv_writer.write_record(&[
                    tx.id.to_string(),
                    account.label.clone(),
                    tx.amount.to_string(),
                    tx.kind.as_str().to_string(),
                    tx.description.clone().unwrap_or_default(),
                    tx.created_at.to_rfc3339(),
                ])?;
                count += 1;
            }
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export account balances to CSV format, closed accounts included
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.ledger.list_accounts(true).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write header
        csv_writer.write_record(&["account", "id", "balance", "status"])?;

        let mut count = 0;
        for account in &accounts {
            csv_writer.write_record(&[
                account.label.as_str(),
                &account.id.to_string(),
                &account.balance.to_string(),
                if account.is_closed() { "closed" } else { "open" },
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export full database as JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let accounts = self.ledger.list_accounts(true).await?;

        let mut transactions = Vec::new();
        for account in &accounts {
            transactions.extend(
                self.ledger
                    .list_transactions(account.id, HistoryOrder::OldestFirst)
                    .await?,
            );
        }

        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts,
            transactions,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
