use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::FraudConfig;
use crate::engine::{EngineError, Evaluation, VerificationReply, VerificationRequest};
use crate::models::{LedgerEntry, Notification, RiskVerdict, Transaction, TransactionError, TransactionStatus};
use crate::risk::RiskEvaluator;
use crate::session::{Resolution, SessionError, SessionRegistry, VerificationSession};
use crate::storage::{Notifier, StorageError, TransactionRepository};
use crate::types::{Timestamp, TransactionId};

const MAX_ATTEMPTS: u32 = 2;
const DEGRADED_NOTICE: &str = "We checked this transaction but couldn't record the result. Verification is temporarily unavailable, please try again shortly.";

/// Decision and session logic for a single transaction id.
///
/// Every method here assumes it is the only writer for the transaction it touches;
/// `FraudEngine` guarantees that by running them inside the id's actor.
pub struct Workflow<R: TransactionRepository, N: Notifier> {
    repository: Arc<R>,
    notifier: Arc<N>,
    registry: SessionRegistry,
    evaluator: RiskEvaluator,
    config: FraudConfig
}

impl<R: TransactionRepository, N: Notifier> Workflow<R, N> {
    pub fn new(repository: Arc<R>, notifier: Arc<N>, config: FraudConfig) -> Self {
        Self {
            repository,
            notifier,
            registry: SessionRegistry::new(&config),
            evaluator: RiskEvaluator::new(config.clone()),
            config
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &FraudConfig {
        &self.config
    }

    /// Scores a transaction and drives it to `approved` or into verification.
    ///
    /// A known transaction id is evaluated from its stored record. If the result
    /// cannot be persisted the verdict is still returned, with a notice and no session.
    ///
    /// # Errors
    /// `AlreadyResolved` when the stored transaction is terminal.
    pub async fn evaluate(&self, submitted: Transaction) -> Result<Evaluation, EngineError> {
        let now = Utc::now();
        let transaction_id = submitted.transaction_id.clone();

        let mut transaction = match self.call("load transaction", || self.repository.load(&transaction_id)).await {
            Ok(Some(stored)) => stored,
            Ok(None) => submitted,
            Err(error) => return self.degraded(submitted, error, now)
        };

        let verdict = self.evaluator.evaluate(&transaction);
        transaction.apply_verdict(&verdict, now)?;

        if let Err(error) = self.call("save transaction", || self.repository.save(transaction.clone())).await {
            return Ok(self.degraded_evaluation(transaction, verdict, error))
        }

        if verdict.suspicious() {
            warn!("Transaction [{transaction_id}] flagged: {}", verdict.reason());
            self.open_session(&transaction, verdict.reason(), now).await?;
        } else {
            info!("Transaction [{transaction_id}] approved: {}", verdict.reason());

            if self.registry.expire(&transaction_id).await {
                info!("Open verification session for transaction [{transaction_id}] closed after re-evaluation");
            }

            self.record_ledger(&transaction).await;
        }

        Ok(Evaluation { verdict, transaction, notice: None })
    }

    /// Opens or continues the verification conversation for a flagged transaction.
    pub async fn verify(&self, request: VerificationRequest) -> Result<VerificationReply, EngineError> {
        let now = Utc::now();
        let transaction = self.load_existing(&request.transaction_id).await?;

        check_display_values(&transaction, &request);

        match request.user_text {
            None => self.start(transaction, now).await,
            Some(text) => self.reply(transaction, &text, request.turn, now).await
        }
    }

    /// Expires the session for `transaction_id` if it is still open and idle at `now`.
    pub async fn expire(&self, transaction_id: &str, now: Timestamp) -> bool {
        self.registry.expire_if_idle(transaction_id, now).await
    }

    /// Read-only view of the stored transaction.
    pub async fn project(&self, transaction_id: &str) -> Result<Transaction, EngineError> {
        self.load_existing(transaction_id).await
    }

    async fn start(&self, transaction: Transaction, now: Timestamp) -> Result<VerificationReply, EngineError> {
        let transaction_id = transaction.transaction_id.clone();

        match self.registry.get(&transaction_id).await {
            Some(session) if !session.state().is_terminal() => Ok(VerificationReply {
                reply: session.greeting().to_string(),
                status: transaction.status(),
                session_state: session.state()
            }),
            Some(session) => Err(SessionError::session_terminal(&transaction_id, session.state()).into()),
            None => {
                if transaction.status().is_terminal() {
                    return Err(TransactionError::already_resolved(&transaction).into())
                }

                let verdict = self.evaluator.evaluate(&transaction);
                let session = self.open_session(&transaction, verdict.reason(), now).await?;

                Ok(VerificationReply {
                    reply: session.greeting().to_string(),
                    status: transaction.status(),
                    session_state: session.state()
                })
            }
        }
    }

    async fn reply(&self, mut transaction: Transaction, text: &str, turn: Option<u32>, now: Timestamp) -> Result<VerificationReply, EngineError> {
        let transaction_id = transaction.transaction_id.clone();

        let Some(mut session) = self.registry.get(&transaction_id).await else {
            return Err(SessionError::no_active_session(&transaction_id).into())
        };

        if let Some(turn) = turn {
            if let Some(reply) = session.replay(turn, text)? {
                debug!("Replayed turn [{turn}] for transaction [{transaction_id}]");
                return Ok(VerificationReply { reply, status: transaction.status(), session_state: session.state() })
            }
        }

        let outcome = match session.submit_reply(text, now) {
            Ok(outcome) => outcome,
            Err(SessionError::EmptyReply { .. }) => {
                self.registry.update(session).await?;
                return Err(SessionError::empty_reply(&transaction_id).into())
            },
            Err(error) => return Err(error.into())
        };

        if let Some(resolution) = outcome.resolution {
            apply_resolution(&mut transaction, resolution, now)?;
            self.call("save transaction", || self.repository.save(transaction.clone())).await?;
            self.finish(&transaction, now).await;
        }

        let session_state = session.state();
        self.registry.update(session).await?;

        Ok(VerificationReply { reply: outcome.reply, status: transaction.status(), session_state })
    }

    async fn open_session(&self, transaction: &Transaction, reason: &str, now: Timestamp) -> Result<VerificationSession, EngineError> {
        if let Some(session) = self.registry.get(&transaction.transaction_id).await {
            if !session.state().is_terminal() {
                return Ok(session)
            }
        }

        let challenge = match self.call("load security challenge", || self.repository.load_challenge(&transaction.user_id)).await {
            Ok(challenge) => challenge,
            Err(error) => {
                warn!("{error}; falling back to YES/NO confirmation");
                None
            }
        };

        let session = VerificationSession::create(transaction, reason, challenge, self.config.max_challenge_attempts, now)?;
        self.registry.put(session.clone()).await?;

        info!("Verification session opened for transaction [{}]", transaction.transaction_id);

        let merchant = transaction.merchant_name().unwrap_or("an unknown merchant");
        self.notify(transaction, format!(
            "We paused transaction {} at {merchant} because it looked suspicious ({reason}). Is it yours?",
            transaction.transaction_id
        ), now).await;

        Ok(session)
    }

    async fn finish(&self, transaction: &Transaction, now: Timestamp) {
        match transaction.status() {
            TransactionStatus::Approved => {
                info!("Transaction [{}] approved by the account holder", transaction.transaction_id);
                self.record_ledger(transaction).await;
            },
            status => warn!("Transaction [{}] resolved as [{status}]", transaction.transaction_id)
        }

        self.notify(transaction, format!(
            "Transaction {} has been {}.",
            transaction.transaction_id,
            transaction.status()
        ), now).await;
    }

    async fn record_ledger(&self, transaction: &Transaction) {
        let Some(entry) = LedgerEntry::for_approved(transaction) else {
            warn!("Transaction [{}] approved without a complete record; no ledger entry written", transaction.transaction_id);
            return
        };

        if let Err(error) = self.call("record ledger", || self.repository.record_ledger(entry.clone())).await {
            error!("{error}");
        }
    }

    async fn notify(&self, transaction: &Transaction, message: String, now: Timestamp) {
        let notification = Notification::new(&transaction.user_id, &transaction.transaction_id, message, now);

        if let Err(error) = self.call("send notification", || self.notifier.notify(notification.clone())).await {
            warn!("{error}; notification for transaction [{}] dropped", transaction.transaction_id);
        }
    }

    async fn load_existing(&self, transaction_id: &str) -> Result<Transaction, EngineError> {
        self.call("load transaction", || self.repository.load(transaction_id)).await?
            .ok_or_else(|| EngineError::transaction_not_found(transaction_id))
    }

    fn degraded(&self, mut transaction: Transaction, error: EngineError, now: Timestamp) -> Result<Evaluation, EngineError> {
        let verdict = self.evaluator.evaluate(&transaction);
        transaction.apply_verdict(&verdict, now)?;

        Ok(self.degraded_evaluation(transaction, verdict, error))
    }

    fn degraded_evaluation(&self, transaction: Transaction, verdict: RiskVerdict, error: EngineError) -> Evaluation {
        error!("{error}; transaction [{}] evaluated without recording or verification", transaction.transaction_id);

        Evaluation { verdict, transaction, notice: Some(DEGRADED_NOTICE.to_string()) }
    }

    /// Runs a collaborator call under the operation timeout, retrying once after the retry delay.
    async fn call<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>
    {
        let mut attempt_number = 1;

        loop {
            let error = match timeout(self.config.operation_timeout, attempt()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => error,
                Err(_) => StorageError::Timeout(self.config.operation_timeout)
            };

            warn!("Attempt {attempt_number} of [{operation}] failed: {error}");

            if attempt_number >= MAX_ATTEMPTS {
                return Err(EngineError::upstream_unavailable(operation, error.to_string()))
            }

            attempt_number += 1;
            sleep(self.config.retry_delay).await;
        }
    }
}

fn apply_resolution(transaction: &mut Transaction, resolution: Resolution, now: Timestamp) -> Result<(), TransactionError> {
    match resolution {
        Resolution::Confirmed => transaction.approve(now),
        Resolution::Denied => transaction.block(now),
        Resolution::ChallengePassed => {
            transaction.mark_verified(now)?;
            transaction.approve(now)
        },
        Resolution::ChallengeFailed => {
            transaction.mark_failed(now)?;
            transaction.block(now)
        }
    }
}

//NOTE: The stored record is authoritative; values echoed by the client are only checked.
fn check_display_values(transaction: &Transaction, request: &VerificationRequest) {
    let id: &TransactionId = &transaction.transaction_id;

    if let Some(merchant) = request.merchant.as_deref() {
        if transaction.merchant_name() != Some(merchant.trim()) {
            warn!("Merchant [{merchant}] supplied for transaction [{id}] does not match the stored record");
        }
    }

    if let Some(amount) = request.amount {
        if transaction.amount != Some(amount) {
            warn!("Amount [{amount}] supplied for transaction [{id}] does not match the stored record");
        }
    }
}
