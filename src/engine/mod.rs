mod errors;
mod fraud_engine;
mod workflow;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{RiskVerdict, Transaction, TransactionStatus};
use crate::session::SessionState;
use crate::types::TransactionId;

pub use errors::EngineError;
pub use fraud_engine::{FraudEngine, SweepReport};
pub use workflow::Workflow;

/// Result of `FraudEngine::evaluate`.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub verdict: RiskVerdict,
    pub transaction: Transaction,
    /// Set when the result could not be recorded and no verification will follow.
    pub notice: Option<String>
}

/// Input of `FraudEngine::start_or_continue_verification`.
///
/// Without `user_text` the call opens (or re-shows) the conversation. `turn` is an
/// optional 1-based index of the user message used to make retries idempotent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub transaction_id: TransactionId,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub user_text: Option<String>,
    #[serde(default)]
    pub turn: Option<u32>
}

impl VerificationRequest {
    pub fn start(transaction_id: &str) -> Self {
        Self { transaction_id: transaction_id.to_string(), ..Self::default() }
    }

    pub fn reply(transaction_id: &str, user_text: &str) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            user_text: Some(user_text.to_string()),
            ..Self::default()
        }
    }

    pub fn with_turn(mut self, turn: u32) -> Self {
        self.turn = Some(turn);
        self
    }

    pub fn with_display(mut self, merchant: &str, amount: Decimal) -> Self {
        self.merchant = Some(merchant.to_string());
        self.amount = Some(amount);
        self
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct VerificationReply {
    pub reply: String,
    pub status: TransactionStatus,
    pub session_state: SessionState
}
