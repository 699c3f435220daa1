use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::spawn;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use crate::engine::{EngineError, Evaluation, VerificationReply, VerificationRequest, Workflow};
use crate::models::Transaction;
use crate::storage::{Notifier, TransactionRepository};
use crate::types::{Timestamp, TransactionId};

/// Work routed to the actor that owns one transaction id.
pub enum Command {
    Evaluate {
        transaction: Transaction,
        respond_to: oneshot::Sender<Result<Evaluation, EngineError>>
    },
    Verify {
        request: VerificationRequest,
        respond_to: oneshot::Sender<Result<VerificationReply, EngineError>>
    },
    Expire {
        now: Timestamp,
        respond_to: oneshot::Sender<bool>
    }
}

/// Serializes every mutation of a single transaction and its session.
///
/// Commands are handled one at a time in arrival order, so a duplicate reply sees the
/// result of the first one. `pending` counts commands accepted but not yet finished.
pub struct TransactionActor {
    sender: mpsc::UnboundedSender<Command>,
    pending: Arc<AtomicUsize>,
    handle: JoinHandle<()>
}

impl TransactionActor {
    pub fn new<R: TransactionRepository, N: Notifier>(transaction_id: TransactionId, workflow: Arc<Workflow<R, N>>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Command>();
        let pending = Arc::new(AtomicUsize::new(0));
        let counter = pending.clone();

        let handle = spawn(async move {
            while let Some(command) = receiver.recv().await {
                //NOTE: The pending count drops before replying so a caller that has its answer sees the actor idle
                match command {
                    Command::Evaluate { transaction, respond_to } => {
                        let result = workflow.evaluate(transaction).await;
                        counter.fetch_sub(1, Ordering::AcqRel);

                        if respond_to.send(result).is_err() {
                            debug!("Caller for evaluation of transaction [{transaction_id}] went away");
                        }
                    },
                    Command::Verify { request, respond_to } => {
                        let result = workflow.verify(request).await;
                        counter.fetch_sub(1, Ordering::AcqRel);

                        if respond_to.send(result).is_err() {
                            debug!("Caller for verification of transaction [{transaction_id}] went away");
                        }
                    },
                    Command::Expire { now, respond_to } => {
                        let expired = workflow.expire(&transaction_id, now).await;
                        counter.fetch_sub(1, Ordering::AcqRel);

                        let _ = respond_to.send(expired);
                    }
                }
            }

            debug!("Actor for transaction [{transaction_id}] stopped");
        });

        Self { sender, pending, handle }
    }

    /// Queues a command. Hands it back if the actor task is no longer running.
    pub fn accept(&self, command: Command) -> Result<(), Command> {
        self.pending.fetch_add(1, Ordering::AcqRel);

        self.sender.send(command).map_err(|error| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            warn!("Actor channel closed; command returned to caller");
            error.0
        })
    }

    /// True when no command is queued or running.
    pub fn is_idle(&self) -> bool {
        self.pending.load(Ordering::Acquire) == 0
    }

    /// True once the actor task has stopped receiving, e.g. after a panic.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Closes the input channel and waits for queued commands to finish.
    pub async fn despawn(self) -> Result<(), JoinError> {
        drop(self.sender);
        self.handle.await
    }
}
