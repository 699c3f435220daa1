use crate::models::{LedgerEntry, Transaction};
use crate::session::SecurityChallenge;
use crate::storage::{StorageError, TransactionRepository};
use crate::types::{TransactionId, UserId};
use dashmap::iter::Iter;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory `TransactionRepository`.
pub struct TransactionStorage {
    transactions: Arc<DashMap<TransactionId, Transaction>>,
    ledger: Arc<DashMap<TransactionId, LedgerEntry>>,
    challenges: Arc<DashMap<UserId, SecurityChallenge>>
}

impl TransactionStorage {
    pub fn new() -> Self {
        Self {
            transactions: Arc::new(DashMap::new()),
            ledger: Arc::new(DashMap::new()),
            challenges: Arc::new(DashMap::new())
        }
    }

    pub fn iter(&self) -> Iter<'_, TransactionId, Transaction> {
        self.transactions.iter()
    }

    pub fn ledger_entry(&self, transaction_id: &str) -> Option<LedgerEntry> {
        self.ledger.get(transaction_id).map(|entry| entry.clone())
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    pub fn register_challenge(&self, user_id: &str, challenge: SecurityChallenge) {
        self.challenges.insert(user_id.to_string(), challenge);
    }
}

impl Default for TransactionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionRepository for TransactionStorage {
    async fn load(&self, transaction_id: &str) -> Result<Option<Transaction>, StorageError> {
        Ok(self.transactions.get(transaction_id).map(|transaction| transaction.clone()))
    }

    async fn save(&self, transaction: Transaction) -> Result<(), StorageError> {
        self.transactions.insert(transaction.transaction_id.clone(), transaction);
        Ok(())
    }

    async fn record_ledger(&self, entry: LedgerEntry) -> Result<LedgerEntry, StorageError> {
        Ok(self.ledger.entry(entry.transaction_id.clone()).or_insert(entry).clone())
    }

    async fn load_challenge(&self, user_id: &str) -> Result<Option<SecurityChallenge>, StorageError> {
        Ok(self.challenges.get(user_id).map(|challenge| challenge.clone()))
    }
}
