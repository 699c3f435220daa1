mod errors;
mod ledger;
mod notification;
mod transaction;
mod verdict;

use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

pub use errors::{TransactionError, ValidationError};
pub use ledger::LedgerEntry;
pub use notification::Notification;
pub use transaction::Transaction;
pub use verdict::{RiskRule, RiskVerdict};

/// Lifecycle status of a transaction record.
///
/// `Approved`, `Blocked` and `Cleared` are terminal. `Verified` and `Failed` are
/// intermediate steps of the security-question flow and are always followed by a
/// terminal status inside the same critical section.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Verified,
    Failed,
    Approved,
    Blocked,
    Cleared
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Verified => "verified",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Blocked => "blocked",
            TransactionStatus::Cleared => "cleared"
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Approved | TransactionStatus::Blocked | TransactionStatus::Cleared)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn allows(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;

        match (self, next) {
            (Pending, Approved | Blocked | Cleared | Verified | Failed) => true,
            (Verified, Approved) => true,
            (Failed, Blocked) => true,
            _ => false
        }
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
