use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AccountId = Uuid;

/// Credits are whole integer units; the caller decides what one credit is
/// worth. Positive amounts add credits, negative amounts spend them.
pub type Credits = i64;

/// An account owns a single credit balance plus the transaction history
/// that produced it. The balance field is the authoritative fast-path
/// value; the ledger is the audit trail kept consistent with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Human-readable handle, unique across the store. The id stays the key.
    pub label: String,
    /// Current balance, always >= 0. Mutated only through the ledger service.
    pub balance: Credits,
    pub created_at: DateTime<Utc>,
    /// Set when the account is closed. Closing retains all history and the
    /// account keeps accepting transactions (refunds can arrive afterwards).
    pub closed_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create a new account with a zero balance.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            balance: 0,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}
