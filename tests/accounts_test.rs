mod common;

use anyhow::Result;
use common::{funded_account, test_ledger};
use creditum::application::LedgerError;
use creditum::domain::TransactionKind;

#[tokio::test]
async fn test_create_account() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let account = ledger.create_account("alice".to_string()).await?;

    assert_eq!(account.label, "alice");
    assert_eq!(account.balance, 0);
    assert!(!account.is_closed());
    assert_eq!(ledger.current_balance(account.id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_label_rejected() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    ledger.create_account("alice".to_string()).await?;
    let result = ledger.create_account("alice".to_string()).await;

    assert!(matches!(result, Err(LedgerError::AccountAlreadyExists(_))));

    Ok(())
}

#[tokio::test]
async fn test_find_account_by_label_or_id() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    let account = ledger.create_account("alice".to_string()).await?;

    let by_label = ledger.find_account("alice").await?;
    assert_eq!(by_label.id, account.id);

    let by_id = ledger.find_account(&account.id.to_string()).await?;
    assert_eq!(by_id.id, account.id);

    let result = ledger.find_account("nobody").await;
    assert!(matches!(result, Err(LedgerError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_list_accounts_excludes_closed() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    ledger.create_account("alice".to_string()).await?;
    ledger.create_account("bob".to_string()).await?;

    ledger.close_account("alice").await?;

    let open = ledger.list_accounts(false).await?;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].label, "bob");

    let all = ledger.list_accounts(true).await?;
    assert_eq!(all.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_close_and_reopen_account() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    ledger.create_account("alice".to_string()).await?;

    let closed = ledger.close_account("alice").await?;
    assert!(closed.is_closed());

    let result = ledger.close_account("alice").await;
    assert!(matches!(result, Err(LedgerError::AccountClosed(_))));

    let reopened = ledger.reopen_account("alice").await?;
    assert!(!reopened.is_closed());

    // Reopening an open account is a no-op
    let reopened = ledger.reopen_account("alice").await?;
    assert!(!reopened.is_closed());

    Ok(())
}

#[tokio::test]
async fn test_closed_account_still_accepts_transactions() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    let account = funded_account(&ledger, "alice", 100).await?;

    ledger.close_account("alice").await?;

    // Closing hides the account from listings but the ledger stays live,
    // e.g. for refunds settling after closure
    let applied = ledger
        .apply(account.id, -40, TransactionKind::Spend, None)
        .await?;
    assert_eq!(applied.balance, 60);

    Ok(())
}

#[tokio::test]
async fn test_account_info() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    let account = ledger.create_account("alice".to_string()).await?;

    let info = ledger.account_info("alice").await?;
    assert_eq!(info.transaction_count, 0);
    assert!(info.last_activity.is_none());

    ledger
        .apply(account.id, 100, TransactionKind::Purchase, None)
        .await?;
    ledger
        .apply(account.id, -30, TransactionKind::Spend, None)
        .await?;

    let info = ledger.account_info("alice").await?;
    assert_eq!(info.account.balance, 70);
    assert_eq!(info.transaction_count, 2);
    assert!(info.last_activity.is_some());

    Ok(())
}

#[tokio::test]
async fn test_verify_single_account() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    let alice = funded_account(&ledger, "alice", 100).await?;
    ledger
        .apply(alice.id, -25, TransactionKind::Spend, None)
        .await?;

    // A consistent account reports no drift
    assert!(ledger.verify_account("alice").await?.is_none());

    let result = ledger.verify_account("nobody").await;
    assert!(matches!(result, Err(LedgerError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_verify_reports_clean_ledger() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    let alice = funded_account(&ledger, "alice", 100).await?;
    funded_account(&ledger, "bob", 40).await?;

    ledger
        .apply(alice.id, -25, TransactionKind::Spend, None)
        .await?;

    let report = ledger.verify().await?;
    assert!(report.is_clean());
    assert_eq!(report.account_count, 2);
    assert_eq!(report.transaction_count, 3);
    assert_eq!(report.zero_amount_rows, 0);
    assert_eq!(report.orphaned_rows, 0);
    assert!(report.drifts.is_empty());

    Ok(())
}
