use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Transaction, TransactionStatus};
use crate::types::{Timestamp, TransactionId, UserId};

/// Permanent record of an approved transaction. At most one per transaction id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub currency: String,
    pub merchant: String,
    pub approved_at: Timestamp
}

impl LedgerEntry {
    /// Returns `None` unless the transaction is approved and carries an amount and merchant.
    pub fn for_approved(transaction: &Transaction) -> Option<Self> {
        if transaction.status() != TransactionStatus::Approved {
            return None
        }

        Some(Self {
            transaction_id: transaction.transaction_id.clone(),
            user_id: transaction.user_id.clone(),
            amount: transaction.amount?,
            currency: transaction.currency.clone(),
            merchant: transaction.merchant_name()?.to_string(),
            approved_at: transaction.updated_at()
        })
    }
}
