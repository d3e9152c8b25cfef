mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use common::{funded_account, test_ledger};
use creditum::application::{HistoryFilter, LedgerError};
use creditum::domain::{HistoryOrder, TransactionKind};
use uuid::Uuid;

#[tokio::test]
async fn test_history_oldest_first_by_default() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    let account = ledger.create_account("alice".to_string()).await?;

    ledger
        .apply(account.id, 100, TransactionKind::Purchase, None)
        .await?;
    ledger
        .apply(account.id, -30, TransactionKind::Spend, None)
        .await?;
    ledger
        .apply(account.id, 5, TransactionKind::Refund, None)
        .await?;

    let history = ledger
        .list_transactions(account.id, HistoryOrder::OldestFirst)
        .await?;

    assert_eq!(history.len(), 3);
    assert_eq!(history[0].amount, 100);
    assert_eq!(history[1].amount, -30);
    assert_eq!(history[2].amount, 5);
    assert!(history.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    assert!(
        history.windows(2).all(|w| w[0].id < w[1].id),
        "ids must break timestamp ties in insertion order"
    );

    Ok(())
}

#[tokio::test]
async fn test_history_newest_first() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    let account = ledger.create_account("alice".to_string()).await?;

    ledger
        .apply(account.id, 100, TransactionKind::Purchase, None)
        .await?;
    ledger
        .apply(account.id, -30, TransactionKind::Spend, None)
        .await?;

    let history = ledger
        .list_transactions(account.id, HistoryOrder::NewestFirst)
        .await?;

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].amount, -30);
    assert_eq!(history[1].amount, 100);

    Ok(())
}

#[tokio::test]
async fn test_history_pagination() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    let account = ledger.create_account("alice".to_string()).await?;

    for amount in [10, 20, 30, 40, 50] {
        ledger
            .apply(account.id, amount, TransactionKind::Purchase, None)
            .await?;
    }

    let page = ledger
        .list_transactions_filtered(
            account.id,
            HistoryFilter {
                limit: Some(2),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].amount, 10);
    assert_eq!(page[1].amount, 20);

    let page = ledger
        .list_transactions_filtered(
            account.id,
            HistoryFilter {
                limit: Some(2),
                offset: Some(2),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].amount, 30);
    assert_eq!(page[1].amount, 40);

    // Offset past the end yields an empty page, not an error
    let page = ledger
        .list_transactions_filtered(
            account.id,
            HistoryFilter {
                limit: Some(2),
                offset: Some(10),
                ..Default::default()
            },
        )
        .await?;
    assert!(page.is_empty());

    // Offset without a limit skips and returns the rest
    let page = ledger
        .list_transactions_filtered(
            account.id,
            HistoryFilter {
                offset: Some(3),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].amount, 40);
    assert_eq!(page[1].amount, 50);

    Ok(())
}

#[tokio::test]
async fn test_history_kind_filter() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    let account = ledger.create_account("alice".to_string()).await?;

    ledger
        .apply(account.id, 100, TransactionKind::Purchase, None)
        .await?;
    ledger
        .apply(account.id, -30, TransactionKind::Spend, None)
        .await?;
    ledger
        .apply(account.id, -20, TransactionKind::Spend, None)
        .await?;
    ledger
        .apply(account.id, 5, TransactionKind::Refund, None)
        .await?;

    let spends = ledger
        .list_transactions_filtered(
            account.id,
            HistoryFilter {
                kind: Some(TransactionKind::Spend),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(spends.len(), 2);
    assert!(spends.iter().all(|tx| tx.kind == TransactionKind::Spend));

    Ok(())
}

#[tokio::test]
async fn test_history_date_range_filter() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    let account = funded_account(&ledger, "alice", 100).await?;

    // A window around now includes today's rows
    let rows = ledger
        .list_transactions_filtered(
            account.id,
            HistoryFilter {
                from_date: Some(Utc::now() - Duration::days(1)),
                to_date: Some(Utc::now() + Duration::days(1)),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(rows.len(), 1);

    // A window entirely in the future excludes them
    let rows = ledger
        .list_transactions_filtered(
            account.id,
            HistoryFilter {
                from_date: Some(Utc::now() + Duration::days(1)),
                ..Default::default()
            },
        )
        .await?;
    assert!(rows.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_history_unknown_account() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;

    let result = ledger
        .list_transactions(Uuid::new_v4(), HistoryOrder::OldestFirst)
        .await;
    assert!(matches!(result, Err(LedgerError::NotFound(_))));

    let result = ledger
        .list_transactions_filtered(Uuid::new_v4(), HistoryFilter::default())
        .await;
    assert!(matches!(result, Err(LedgerError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_history_empty_for_new_account() -> Result<()> {
    let (ledger, _temp) = test_ledger().await?;
    let account = ledger.create_account("alice".to_string()).await?;

    let history = ledger
        .list_transactions(account.id, HistoryOrder::OldestFirst)
        .await?;
    assert!(history.is_empty());

    Ok(())
}
