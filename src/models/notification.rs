use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, TransactionId, UserId};

/// In-app message addressed to the account holder.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub transaction_id: TransactionId,
    pub message: String,
    pub read: bool,
    pub created_at: Timestamp
}

impl Notification {
    pub fn new(user_id: &str, transaction_id: &str, message: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            user_id: user_id.to_string(),
            transaction_id: transaction_id.to_string(),
            message: message.into(),
            read: false,
            created_at
        }
    }
}
