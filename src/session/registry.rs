use std::time::Duration;

use dashmap::DashMap;
use moka::future::Cache;
use tracing::{debug, info};

use crate::config::FraudConfig;
use crate::session::{SessionError, VerificationSession};
use crate::types::{Timestamp, TransactionId};

/// The single owner of verification session state, keyed by transaction id.
///
/// Open sessions live in `active`. Resolved and expired sessions move to a bounded,
/// time-limited archive so late replies can still be answered with `SessionTerminal`.
///
/// The registry does not serialize callers: writes for one transaction id must come
/// from that id's actor.
pub struct SessionRegistry {
    active: DashMap<TransactionId, VerificationSession>,
    archive: Cache<TransactionId, VerificationSession>,
    idle_timeout: Duration
}

impl SessionRegistry {
    pub fn new(config: &FraudConfig) -> Self {
        Self {
            active: DashMap::new(),
            archive: Cache::builder()
                .max_capacity(config.session_archive_capacity)
                .time_to_live(config.session_archive_retention)
                .build(),
            idle_timeout: config.session_idle_timeout
        }
    }

    /// The current session for a transaction, open or archived.
    pub async fn get(&self, transaction_id: &str) -> Option<VerificationSession> {
        if let Some(session) = self.active.get(transaction_id) {
            return Some(session.clone())
        }

        self.archive.get(transaction_id).await
    }

    /// Registers a session. Replaces a previous session only if that one has ended.
    ///
    /// # Errors
    /// `AlreadyActive` while an open session exists for the same transaction.
    pub async fn put(&self, session: VerificationSession) -> Result<(), SessionError> {
        let transaction_id = session.transaction_id().to_string();

        if self.active.get(&transaction_id).is_some_and(|current| !current.state().is_terminal()) {
            return Err(SessionError::already_active(&transaction_id))
        }

        self.archive.invalidate(&transaction_id).await;
        self.store(transaction_id, session).await;

        Ok(())
    }

    /// Replaces the open session with its next version, archiving it once it has ended.
    ///
    /// # Errors
    /// `NoActiveSession` if no open session exists for the transaction.
    pub async fn update(&self, session: VerificationSession) -> Result<(), SessionError> {
        let transaction_id = session.transaction_id().to_string();

        if !self.active.contains_key(&transaction_id) {
            return Err(SessionError::no_active_session(&transaction_id))
        }

        self.store(transaction_id, session).await;

        Ok(())
    }

    /// Ids of open sessions idle for longer than the configured timeout.
    pub fn idle_sessions(&self, now: Timestamp) -> Vec<TransactionId> {
        self.active.iter()
            .filter(|entry| entry.value().is_idle(now, self.idle_timeout))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Expires one session if it is still open and idle. Returns whether it was expired.
    pub async fn expire_if_idle(&self, transaction_id: &str, now: Timestamp) -> bool {
        self.expire_when(transaction_id, |session| session.is_idle(now, self.idle_timeout)).await
    }

    /// Expires an open session regardless of activity.
    pub async fn expire(&self, transaction_id: &str) -> bool {
        self.expire_when(transaction_id, |_| true).await
    }

    async fn expire_when<F>(&self, transaction_id: &str, predicate: F) -> bool
    where
        F: Fn(&VerificationSession) -> bool
    {
        let Some(mut session) = self.active.get(transaction_id).map(|session| session.clone()) else {
            return false
        };

        if !predicate(&session) || !session.expire() {
            return false
        }

        info!("Verification session for transaction [{transaction_id}] expired");
        self.store(transaction_id.to_string(), session).await;

        true
    }

    /// Expires every idle open session and returns their ids.
    pub async fn sweep_expired(&self, now: Timestamp) -> Vec<TransactionId> {
        let mut expired = Vec::new();

        for transaction_id in self.idle_sessions(now) {
            if self.expire_if_idle(&transaction_id, now).await {
                expired.push(transaction_id);
            }
        }

        expired
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub async fn archived_count(&self) -> u64 {
        self.archive.run_pending_tasks().await;
        self.archive.entry_count()
    }

    async fn store(&self, transaction_id: TransactionId, session: VerificationSession) {
        if session.state().is_terminal() {
            debug!("Archiving verification session for transaction [{transaction_id}] as [{:?}]", session.state());
            self.active.remove(&transaction_id);
            self.archive.insert(transaction_id, session).await;
        } else {
            self.active.insert(transaction_id, session);
        }
    }
}
