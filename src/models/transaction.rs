use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::errors::{TransactionError, ValidationError};
use crate::models::{RiskVerdict, TransactionStatus};
use crate::types::{Timestamp, TransactionId, UserId};

fn default_currency() -> String {
    "USD".to_string()
}

/// A single card transaction as seen by the fraud core.
///
/// `amount` and `merchant` are optional because submissions arrive from outside
/// and may be incomplete; the evaluator fails closed on those. `status` and
/// `suspicious_flag` can only change through the transition methods below and are
/// never taken from deserialized input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    #[serde(default)]
    pub user_id: UserId,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default = "Utc::now")]
    pub transaction_date: Timestamp,
    #[serde(skip_deserializing)]
    status: TransactionStatus,
    #[serde(skip_deserializing)]
    suspicious_flag: bool,
    #[serde(skip_deserializing, default = "Utc::now")]
    created_at: Timestamp,
    #[serde(skip_deserializing, default = "Utc::now")]
    updated_at: Timestamp
}

impl Transaction {
    /// Creates a freshly submitted transaction in `pending` status.
    pub fn new(
        transaction_id: impl Into<TransactionId>,
        user_id: impl Into<UserId>,
        amount: Decimal,
        currency: impl Into<String>,
        merchant: impl Into<String>,
        transaction_date: Timestamp
    ) -> Self {
        let now = Utc::now();

        Self {
            transaction_id: transaction_id.into(),
            user_id: user_id.into(),
            amount: Some(amount),
            currency: currency.into(),
            merchant: Some(merchant.into()),
            transaction_date,
            status: TransactionStatus::Pending,
            suspicious_flag: false,
            created_at: now,
            updated_at: now
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn is_suspicious(&self) -> bool {
        self.suspicious_flag
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Merchant text with surrounding whitespace removed, `None` when blank.
    pub fn merchant_name(&self) -> Option<&str> {
        self.merchant.as_deref().map(str::trim).filter(|merchant| !merchant.is_empty())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.amount.is_none() {
            return Err(ValidationError::MissingAmount { transaction_id: self.transaction_id.clone() })
        }

        if self.merchant_name().is_none() {
            return Err(ValidationError::MissingMerchant { transaction_id: self.transaction_id.clone() })
        }

        Ok(())
    }

    /// Records a risk verdict.
    ///
    /// A clean verdict approves the transaction. A suspicious one only raises the flag
    /// and leaves the transaction `pending` until a verification session resolves it.
    ///
    /// # Errors
    /// `AlreadyResolved` on a terminal transaction, `InvalidTransition` outside `pending`.
    pub fn apply_verdict(&mut self, verdict: &RiskVerdict, now: Timestamp) -> Result<(), TransactionError> {
        if self.status.is_terminal() {
            return Err(TransactionError::already_resolved(self))
        }

        if !verdict.suspicious() {
            return self.approve(now)
        }

        if self.status != TransactionStatus::Pending {
            return Err(TransactionError::invalid_transition(self, TransactionStatus::Pending))
        }

        self.suspicious_flag = true;
        self.touch(now);

        Ok(())
    }

    /// The account holder confirmed the transaction. Clears the suspicion flag.
    pub fn approve(&mut self, now: Timestamp) -> Result<(), TransactionError> {
        self.transition(TransactionStatus::Approved, now)?;
        self.suspicious_flag = false;

        Ok(())
    }

    /// The account holder denied the transaction. The suspicion flag is kept.
    pub fn block(&mut self, now: Timestamp) -> Result<(), TransactionError> {
        self.transition(TransactionStatus::Blocked, now)
    }

    pub fn clear(&mut self, now: Timestamp) -> Result<(), TransactionError> {
        self.transition(TransactionStatus::Cleared, now)
    }

    /// Identity proven through a security question; must be followed by `approve`.
    pub fn mark_verified(&mut self, now: Timestamp) -> Result<(), TransactionError> {
        self.transition(TransactionStatus::Verified, now)?;
        self.suspicious_flag = false;

        Ok(())
    }

    /// Security question failed too many times; must be followed by `block`.
    pub fn mark_failed(&mut self, now: Timestamp) -> Result<(), TransactionError> {
        self.transition(TransactionStatus::Failed, now)
    }

    fn transition(&mut self, next: TransactionStatus, now: Timestamp) -> Result<(), TransactionError> {
        if self.status.is_terminal() {
            return Err(TransactionError::already_resolved(self))
        }

        if !self.status.allows(next) {
            return Err(TransactionError::invalid_transition(self, next))
        }

        self.status = next;
        self.touch(now);

        Ok(())
    }

    //NOTE: Clocks can step backwards; timestamps on the record never do.
    fn touch(&mut self, now: Timestamp) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}
