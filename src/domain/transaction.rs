use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Credits};

/// Transaction ids are assigned by the store from an append-only integer
/// sequence, so a later transaction always carries a larger id.
pub type TransactionId = i64;

/// Classification of a ledger entry. Kinds never influence sign handling:
/// the signed `amount` alone decides whether an entry credits or debits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Credits bought by the account owner
    Purchase,
    /// Credits consumed by a service
    Spend,
    /// Manual correction by an operator
    Adjustment,
    /// Credits returned after a cancelled purchase or spend
    Refund,
}

impl TransactionKind {
    /// Every valid kind, in display order.
    pub const ALL: [TransactionKind; 4] = [
        TransactionKind::Purchase,
        TransactionKind::Spend,
        TransactionKind::Adjustment,
        TransactionKind::Refund,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Purchase => "purchase",
            TransactionKind::Spend => "spend",
            TransactionKind::Adjustment => "adjustment",
            TransactionKind::Refund => "refund",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "purchase" => Some(TransactionKind::Purchase),
            "spend" => Some(TransactionKind::Spend),
            "adjustment" => Some(TransactionKind::Adjustment),
            "refund" => Some(TransactionKind::Refund),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single ledger entry: one signed balance delta that has already been
/// applied to its account. Entries are immutable - corrections are made by
/// appending compensating transactions (refunds or adjustments), never by
/// editing history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    /// Signed delta: positive adds credits, negative spends them. Never zero.
    pub amount: Credits,
    pub kind: TransactionKind,
    pub description: Option<String>,
    /// Commit timestamp, fixed once written.
    pub created_at: DateTime<Utc>,
}

/// Ordering for transaction history reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryOrder {
    /// Ascending creation order, ties broken by id.
    #[default]
    OldestFirst,
    /// Descending creation order - what a history page shows.
    NewestFirst,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in TransactionKind::ALL {
            let s = kind.as_str();
            let parsed = TransactionKind::from_str(s).unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!(
            TransactionKind::from_str("PURCHASE"),
            Some(TransactionKind::Purchase)
        );
        assert_eq!(
            TransactionKind::from_str("Refund"),
            Some(TransactionKind::Refund)
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert_eq!(TransactionKind::from_str("bonus"), None);
        assert_eq!(TransactionKind::from_str(""), None);
    }

    #[test]
    fn test_kind_display_matches_wire_form() {
        assert_eq!(TransactionKind::Spend.to_string(), "spend");
        assert_eq!(TransactionKind::Adjustment.to_string(), "adjustment");
    }
}
