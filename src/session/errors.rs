use crate::session::SessionState;
use crate::types::TransactionId;
use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum SessionError {
    #[error("A verification session is already active for transaction [{transaction_id}]")]
    AlreadyActive {
        transaction_id: TransactionId
    },
    #[error("No verification session exists for transaction [{transaction_id}]")]
    NoActiveSession {
        transaction_id: TransactionId
    },
    #[error("Verification session for transaction [{transaction_id}] has ended as [{state:?}]")]
    SessionTerminal {
        transaction_id: TransactionId,
        state: SessionState
    },
    #[error("Transaction [{transaction_id}] is not awaiting verification")]
    NotFlagged {
        transaction_id: TransactionId
    },
    #[error("Empty reply received for transaction [{transaction_id}]")]
    EmptyReply {
        transaction_id: TransactionId
    },
    #[error("Turn [{turn}] conflicts with the recorded conversation for transaction [{transaction_id}]")]
    TurnConflict {
        transaction_id: TransactionId,
        turn: u32
    }
}

impl SessionError {
    pub fn already_active(transaction_id: &str) -> Self {
        Self::AlreadyActive { transaction_id: transaction_id.to_string() }
    }

    pub fn no_active_session(transaction_id: &str) -> Self {
        Self::NoActiveSession { transaction_id: transaction_id.to_string() }
    }

    pub fn session_terminal(transaction_id: &str, state: SessionState) -> Self {
        Self::SessionTerminal { transaction_id: transaction_id.to_string(), state }
    }

    pub fn not_flagged(transaction_id: &str) -> Self {
        Self::NotFlagged { transaction_id: transaction_id.to_string() }
    }

    pub fn empty_reply(transaction_id: &str) -> Self {
        Self::EmptyReply { transaction_id: transaction_id.to_string() }
    }

    pub fn turn_conflict(transaction_id: &str, turn: u32) -> Self {
        Self::TurnConflict { transaction_id: transaction_id.to_string(), turn }
    }
}
