mod challenge;
mod classifier;
mod errors;
mod registry;
#[cfg(test)]
mod tests;
mod verification_session;

use serde::{Deserialize, Serialize};

pub use challenge::{SecurityChallenge, SecurityQuestion};
pub use classifier::{ReplyClassifier, ReplyIntent};
pub use errors::SessionError;
pub use registry::SessionRegistry;
pub use verification_session::{ReplyOutcome, Resolution, TransactionSnapshot, Turn, VerificationSession};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Greeting,
    AwaitingResponse,
    ResolvedApproved,
    ResolvedBlocked,
    Expired
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::ResolvedApproved | SessionState::ResolvedBlocked | SessionState::Expired)
    }
}
