use crate::models::TransactionError;
use crate::session::SessionError;
use crate::types::TransactionId;
use thiserror::Error;

const GENERIC_MESSAGE: &str = "Sorry, we couldn't complete your request right now.";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Transaction [{transaction_id}] was not found")]
    TransactionNotFound {
        transaction_id: TransactionId
    },
    #[error("Upstream dependency unavailable during [{operation}]: {detail}")]
    UpstreamUnavailable {
        operation: &'static str,
        detail: String
    },
    #[error("Actor for transaction [{transaction_id}] is unavailable")]
    ActorUnavailable {
        transaction_id: TransactionId
    }
}

impl EngineError {
    pub fn transaction_not_found(transaction_id: &str) -> Self {
        Self::TransactionNotFound { transaction_id: transaction_id.to_string() }
    }

    pub fn upstream_unavailable(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::UpstreamUnavailable { operation, detail: detail.into() }
    }

    pub fn actor_unavailable(transaction_id: &str) -> Self {
        Self::ActorUnavailable { transaction_id: transaction_id.to_string() }
    }

    /// Generic message for the account holder followed by the diagnostic detail.
    pub fn user_message(&self) -> String {
        format!("{GENERIC_MESSAGE} ({self})")
    }
}
