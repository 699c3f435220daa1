use crate::models::{Transaction, TransactionStatus};
use crate::types::TransactionId;
use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum TransactionError {
    #[error("Transaction [{transaction_id}] is already resolved as [{status}]")]
    AlreadyResolved {
        transaction_id: TransactionId,
        status: TransactionStatus
    },
    #[error("Transaction [{transaction_id}] cannot move from [{from}] to [{to}]")]
    InvalidTransition {
        transaction_id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus
    }
}

impl TransactionError {
    pub fn already_resolved(tx: &Transaction) -> Self {
        Self::AlreadyResolved {
            transaction_id: tx.transaction_id.clone(),
            status: tx.status()
        }
    }

    pub fn invalid_transition(tx: &Transaction, to: TransactionStatus) -> Self {
        Self::InvalidTransition {
            transaction_id: tx.transaction_id.clone(),
            from: tx.status(),
            to
        }
    }
}

/// A transaction that cannot be judged on its attributes. Never rejected outright:
/// the evaluator turns this into a suspicious verdict.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ValidationError {
    #[error("Amount is required for transaction [{transaction_id}]")]
    MissingAmount {
        transaction_id: TransactionId
    },
    #[error("Merchant is required for transaction [{transaction_id}]")]
    MissingMerchant {
        transaction_id: TransactionId
    }
}
