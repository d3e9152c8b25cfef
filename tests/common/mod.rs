// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use creditum::application::CreditLedger;
use creditum::domain::{Account, Credits, TransactionKind};
use tempfile::TempDir;

/// Helper to create a test ledger with a temporary database
pub async fn test_ledger() -> Result<(CreditLedger, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let ledger = CreditLedger::init(db_path.to_str().unwrap()).await?;
    Ok((ledger, temp_dir))
}

/// Create an account and give it an opening balance with a purchase.
pub async fn funded_account(
    ledger: &CreditLedger,
    label: &str,
    opening: Credits,
) -> Result<Account> {
    let account = ledger.create_account(label.to_string()).await?;
    if opening != 0 {
        ledger
            .apply(account.id, opening, TransactionKind::Purchase, None)
            .await?;
    }
    Ok(ledger.get_account(account.id).await?)
}
