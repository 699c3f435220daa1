use std::sync::{Arc, Weak};

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use tokio::spawn;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::actors::{Command, TransactionActor};
use crate::config::{FraudConfig, MIN_SWEEP_INTERVAL};
use crate::engine::{EngineError, Evaluation, VerificationReply, VerificationRequest, Workflow};
use crate::models::Transaction;
use crate::session::VerificationSession;
use crate::storage::{Notifier, TransactionRepository};
use crate::types::{Timestamp, TransactionId};

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SweepReport {
    pub expired: Vec<TransactionId>,
    pub reaped_actors: usize
}

/// Entry point for transaction evaluation and account-holder verification.
///
/// Calls for different transactions run concurrently. Calls for the same transaction
/// are routed to one actor and handled strictly in order.
pub struct FraudEngine<R: TransactionRepository, N: Notifier> {
    workflow: Arc<Workflow<R, N>>,
    actors: DashMap<TransactionId, TransactionActor>
}

impl<R: TransactionRepository, N: Notifier> FraudEngine<R, N> {
    pub fn new(repository: Arc<R>, notifier: Arc<N>, config: FraudConfig) -> Self {
        Self {
            workflow: Arc::new(Workflow::new(repository, notifier, config)),
            actors: DashMap::new()
        }
    }

    /// Scores a transaction, approving it or opening a verification session.
    pub async fn evaluate(&self, transaction: Transaction) -> Result<Evaluation, EngineError> {
        let transaction_id = transaction.transaction_id.clone();

        self.dispatch(&transaction_id, |respond_to| Command::Evaluate { transaction, respond_to }).await?
    }

    /// Opens the conversation when `user_text` is absent, otherwise handles one reply.
    pub async fn start_or_continue_verification(&self, request: VerificationRequest) -> Result<VerificationReply, EngineError> {
        let transaction_id = request.transaction_id.clone();

        self.dispatch(&transaction_id, |respond_to| Command::Verify { request, respond_to }).await?
    }

    /// Current stored state of a transaction. Read-only, so it bypasses the actor.
    pub async fn transaction(&self, transaction_id: &str) -> Result<Transaction, EngineError> {
        self.workflow.project(transaction_id).await
    }

    /// Current session of a transaction, open or recently ended.
    pub async fn session(&self, transaction_id: &str) -> Option<VerificationSession> {
        self.workflow.registry().get(transaction_id).await
    }

    /// Expires sessions idle at `now` and drops actors that are idle or have stopped.
    pub async fn sweep_expired(&self, now: Timestamp) -> SweepReport {
        let mut report = SweepReport::default();

        for transaction_id in self.workflow.registry().idle_sessions(now) {
            match self.dispatch(&transaction_id, |respond_to| Command::Expire { now, respond_to }).await {
                Ok(true) => report.expired.push(transaction_id),
                Ok(false) => debug!("Session for transaction [{transaction_id}] became active again before expiry"),
                Err(error) => error!("{error}")
            }
        }

        //NOTE: An actor whose task panicked keeps its pending count forever, so closed actors are dropped too
        let before = self.actors.len();
        self.actors.retain(|_, actor| !actor.is_idle() && !actor.is_closed());
        report.reaped_actors = before.saturating_sub(self.actors.len());

        if !report.expired.is_empty() || report.reaped_actors > 0 {
            info!("Sweep expired {} session(s) and reaped {} actor(s)", report.expired.len(), report.reaped_actors);
        }

        report
    }

    /// Runs `sweep_expired` on the configured interval until the engine is dropped.
    pub fn spawn_sweeper(engine: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(engine);
        let period = engine.workflow.config().sweep_interval.max(MIN_SWEEP_INTERVAL);

        spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(engine) = weak.upgrade() else {
                    debug!("Engine dropped; sweeper stopping");
                    break
                };

                engine.sweep_expired(Utc::now()).await;
            }
        })
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Stops accepting work and waits for every actor to drain its queue.
    pub async fn shutdown(self) {
        let despawns = self.actors.into_iter().map(|(_, actor)| actor.despawn());

        for result in join_all(despawns).await {
            if let Err(error) = result {
                error!("A transaction actor did not despawn gracefully: {error:?}");
            }
        }
    }

    async fn dispatch<T, F>(&self, transaction_id: &str, build: F) -> Result<T, EngineError>
    where
        F: FnOnce(oneshot::Sender<T>) -> Command
    {
        let (respond_to, response) = oneshot::channel();
        let mut command = build(respond_to);

        for _ in 0..2 {
            //NOTE: The entry guard holds the shard lock, so `sweep_expired` cannot reap the actor between lookup and enqueue
            let rejected = {
                let actor = self.actors.entry(transaction_id.to_string())
                    .or_insert_with(|| TransactionActor::new(transaction_id.to_string(), self.workflow.clone()));

                actor.accept(command).err()
            };

            match rejected {
                None => return response.await.map_err(|_| EngineError::actor_unavailable(transaction_id)),
                Some(returned) => {
                    warn!("Actor for transaction [{transaction_id}] stopped unexpectedly; respawning");
                    self.actors.remove_if(transaction_id, |_, actor| actor.is_closed());
                    command = returned;
                }
            }
        }

        Err(EngineError::actor_unavailable(transaction_id))
    }
}
