use thiserror::Error;

use crate::domain::{AccountId, Credits};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Account is already closed: {0}")]
    AccountClosed(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid transaction kind: {0} (valid kinds: purchase, spend, adjustment, refund)")]
    InvalidKind(String),

    #[error(
        "Insufficient balance on account {account}: balance {balance}, requested {amount}"
    )]
    InsufficientBalance {
        account: AccountId,
        balance: Credits,
        amount: Credits,
    },

    #[error("Concurrent update on the same account; retry the operation")]
    ConcurrencyConflict,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] anyhow::Error),
}
