use std::time::Duration;

use chrono::TimeDelta;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::models::{Transaction, TransactionStatus};
use crate::session::classifier::{normalize, ReplyClassifier, ReplyIntent};
use crate::session::{Role, SecurityChallenge, SecurityQuestion, SessionError, SessionState};
use crate::types::{Timestamp, TransactionId};

const CONFIRM_PROMPT: &str = "Was this you? Reply YES or NO.";
const REPROMPT: &str = "Please reply YES if you made this transaction, or NO if you did not.";

/// One message in the conversation. Immutable once appended.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Turn {
    role: Role,
    text: String,
    timestamp: Timestamp
}

impl Turn {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Transaction attributes captured when the session is created.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct TransactionSnapshot {
    pub merchant: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: String,
    pub reason: String
}

impl TransactionSnapshot {
    fn describe(&self, transaction_id: &str) -> String {
        let merchant = self.merchant.as_deref().unwrap_or("an unknown merchant");
        let amount = match self.amount {
            Some(amount) => format!("{amount} {}", self.currency),
            None => "an unknown amount".to_string()
        };

        format!("transaction {transaction_id} at {merchant} for {amount}")
    }
}

/// How a resolved reply must move the transaction.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Resolution {
    /// `pending -> approved`
    Confirmed,
    /// `pending -> blocked`
    Denied,
    /// `pending -> verified -> approved`
    ChallengePassed,
    /// `pending -> failed -> blocked`
    ChallengeFailed
}

impl Resolution {
    pub fn final_status(&self) -> TransactionStatus {
        match self {
            Resolution::Confirmed | Resolution::ChallengePassed => TransactionStatus::Approved,
            Resolution::Denied | Resolution::ChallengeFailed => TransactionStatus::Blocked
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReplyOutcome {
    pub reply: String,
    pub resolution: Option<Resolution>
}

/// Conversation that carries one flagged transaction to a resolution.
///
/// The turn list is append-only. `Greeting` holds until the first user turn,
/// after which the session waits in `AwaitingResponse` until a reply resolves it.
#[derive(Debug, Clone)]
pub struct VerificationSession {
    transaction_id: TransactionId,
    snapshot: TransactionSnapshot,
    challenge: Option<SecurityChallenge>,
    answered: usize,
    classifier: ReplyClassifier,
    turns: Vec<Turn>,
    state: SessionState,
    failed_attempts: u32,
    max_attempts: u32,
    created_at: Timestamp,
    last_activity: Timestamp
}

impl VerificationSession {
    /// Opens a session for a flagged, still pending transaction and appends the greeting.
    ///
    /// # Errors
    /// `NotFlagged` when the transaction is not suspicious or no longer pending.
    pub fn create(
        transaction: &Transaction,
        reason: &str,
        challenge: Option<SecurityChallenge>,
        max_attempts: u32,
        now: Timestamp
    ) -> Result<Self, SessionError> {
        if !transaction.is_suspicious() || transaction.status() != TransactionStatus::Pending {
            return Err(SessionError::not_flagged(&transaction.transaction_id))
        }

        let classifier = match challenge {
            Some(_) => ReplyClassifier::challenge(),
            None => ReplyClassifier::confirmation()
        };

        let mut session = Self {
            transaction_id: transaction.transaction_id.clone(),
            snapshot: TransactionSnapshot {
                merchant: transaction.merchant_name().map(str::to_string),
                amount: transaction.amount,
                currency: transaction.currency.clone(),
                reason: reason.to_string()
            },
            challenge,
            answered: 0,
            classifier,
            turns: Vec::new(),
            state: SessionState::Greeting,
            failed_attempts: 0,
            max_attempts: max_attempts.max(1),
            created_at: now,
            last_activity: now
        };

        let greeting = session.greeting_text();
        session.append(Role::Assistant, greeting, now);

        Ok(session)
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn snapshot(&self) -> &TransactionSnapshot {
        &self.snapshot
    }

    pub fn has_challenge(&self) -> bool {
        self.challenge.is_some()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn last_activity(&self) -> Timestamp {
        self.last_activity
    }

    /// The opening assistant message.
    pub fn greeting(&self) -> &str {
        self.turns.first().map(Turn::text).unwrap_or_default()
    }

    pub fn user_turn_count(&self) -> usize {
        self.turns.iter().filter(|turn| turn.role == Role::User).count()
    }

    /// Interprets one user reply, appending the user turn and the assistant answer.
    ///
    /// # Errors
    /// - `SessionTerminal` once the session is resolved or expired; nothing is appended.
    /// - `EmptyReply` for blank input; the user turn is kept, no answer is appended.
    pub fn submit_reply(&mut self, text: &str, now: Timestamp) -> Result<ReplyOutcome, SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::session_terminal(&self.transaction_id, self.state))
        }

        self.append(Role::User, text.trim().to_string(), now);
        self.state = SessionState::AwaitingResponse;

        if normalize(text).is_empty() {
            return Err(SessionError::empty_reply(&self.transaction_id))
        }

        let intent = self.classifier.classify(text, self.current_question());
        debug!("Reply for transaction [{}] classified as [{intent:?}]", self.transaction_id);

        let outcome = self.respond(intent);
        self.append(Role::Assistant, outcome.reply.clone(), now);

        Ok(outcome)
    }

    /// Looks up a previously submitted user turn by its 1-based index.
    ///
    /// Returns `Ok(None)` when `turn` is the next unused index, and the recorded
    /// assistant answer when the same text was already submitted under that index.
    pub fn replay(&self, turn: u32, text: &str) -> Result<Option<String>, SessionError> {
        let user_turns = self.user_turn_count();
        let index = turn as usize;

        if index == user_turns + 1 {
            return Ok(None)
        }

        if index == 0 || index > user_turns {
            return Err(SessionError::turn_conflict(&self.transaction_id, turn))
        }

        let position = self.turns.iter()
            .enumerate()
            .filter(|(_, turn)| turn.role == Role::User)
            .nth(index - 1)
            .map(|(position, _)| position)
            .ok_or_else(|| SessionError::turn_conflict(&self.transaction_id, turn))?;

        if self.turns[position].text != text.trim() {
            return Err(SessionError::turn_conflict(&self.transaction_id, turn))
        }

        match self.turns.get(position + 1) {
            Some(answer) if answer.role == Role::Assistant => Ok(Some(answer.text.clone())),
            _ => Err(SessionError::empty_reply(&self.transaction_id))
        }
    }

    /// Whether the session is still open and has seen no activity for longer than `timeout`.
    pub fn is_idle(&self, now: Timestamp, timeout: Duration) -> bool {
        let Ok(timeout) = TimeDelta::from_std(timeout) else {
            return false
        };

        !self.state.is_terminal() && now - self.last_activity > timeout
    }

    /// Moves an open session to `Expired`. Returns `false` if it had already ended.
    pub fn expire(&mut self) -> bool {
        if self.state.is_terminal() {
            return false
        }

        self.state = SessionState::Expired;

        true
    }

    fn respond(&mut self, intent: ReplyIntent) -> ReplyOutcome {
        match intent {
            ReplyIntent::Confirm => self.resolve(
                SessionState::ResolvedApproved,
                Resolution::Confirmed,
                format!("Thanks for confirming. Transaction {} has been approved.", self.transaction_id)
            ),
            ReplyIntent::AnswerChallenge => self.accept_answer(),
            ReplyIntent::Deny => self.resolve(
                SessionState::ResolvedBlocked,
                Resolution::Denied,
                format!("Thanks for letting us know. Transaction {} has been blocked to protect your account.", self.transaction_id)
            ),
            ReplyIntent::Explain => ReplyOutcome {
                reply: format!("This transaction was flagged for the following reason: {}. {}", self.snapshot.reason, self.prompt()),
                resolution: None
            },
            ReplyIntent::Unrecognized => self.unrecognized()
        }
    }

    fn accept_answer(&mut self) -> ReplyOutcome {
        self.answered += 1;

        if let Some(next) = self.current_question().map(|question| question.text().to_string()) {
            return ReplyOutcome { reply: format!("That's correct. Next security question: {next}"), resolution: None }
        }

        self.resolve(
            SessionState::ResolvedApproved,
            Resolution::ChallengePassed,
            format!("Your answers are correct. Transaction {} has been approved.", self.transaction_id)
        )
    }

    fn unrecognized(&mut self) -> ReplyOutcome {
        let Some(question) = self.current_question().map(|question| question.text().to_string()) else {
            return ReplyOutcome { reply: REPROMPT.to_string(), resolution: None }
        };

        self.failed_attempts += 1;

        if self.failed_attempts >= self.max_attempts {
            return self.resolve(
                SessionState::ResolvedBlocked,
                Resolution::ChallengeFailed,
                format!("That answer doesn't match our records. Transaction {} has been blocked to protect your account.", self.transaction_id)
            )
        }

        let remaining = self.max_attempts - self.failed_attempts;

        ReplyOutcome {
            reply: format!("That answer doesn't match our records. You have {remaining} attempt(s) left. {question}"),
            resolution: None
        }
    }

    fn current_question(&self) -> Option<&SecurityQuestion> {
        self.challenge.as_ref().and_then(|challenge| challenge.get(self.answered))
    }

    fn resolve(&mut self, state: SessionState, resolution: Resolution, reply: String) -> ReplyOutcome {
        self.state = state;

        ReplyOutcome { reply, resolution: Some(resolution) }
    }

    fn prompt(&self) -> String {
        match self.current_question() {
            Some(question) => format!("Please answer the security question: {}", question.text()),
            None => CONFIRM_PROMPT.to_string()
        }
    }

    fn greeting_text(&self) -> String {
        format!(
            "We flagged {} ({}). {}",
            self.snapshot.describe(&self.transaction_id),
            self.snapshot.reason,
            self.prompt()
        )
    }

    fn append(&mut self, role: Role, text: String, now: Timestamp) {
        let timestamp = self.turns.last()
            .map(|turn| turn.timestamp.max(now))
            .unwrap_or(now);

        self.turns.push(Turn { role, text, timestamp });
        self.last_activity = self.last_activity.max(timestamp);
    }
}
