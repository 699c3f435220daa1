mod errors;
mod notification_outbox;
mod transaction_storage;

use std::future::Future;

use crate::models::{LedgerEntry, Notification, Transaction};
use crate::session::SecurityChallenge;

pub use errors::StorageError;
pub use notification_outbox::NotificationOutbox;
pub use transaction_storage::TransactionStorage;

/// Persistence for transaction records, owned by the caller.
///
/// The fraud core never assumes a storage technology; every call is bounded by a
/// timeout and retried once by the engine.
pub trait TransactionRepository: Send + Sync + 'static {
    fn load(&self, transaction_id: &str) -> impl Future<Output = Result<Option<Transaction>, StorageError>> + Send;
    fn save(&self, transaction: Transaction) -> impl Future<Output = Result<(), StorageError>> + Send;
    /// Writes the ledger entry once per transaction id and returns the stored entry.
    fn record_ledger(&self, entry: LedgerEntry) -> impl Future<Output = Result<LedgerEntry, StorageError>> + Send;
    /// The security question registered for a user, if any.
    fn load_challenge(&self, user_id: &str) -> impl Future<Output = Result<Option<SecurityChallenge>, StorageError>> + Send;
}

/// Outbound channel to the account holder.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification) -> impl Future<Output = Result<(), StorageError>> + Send;
}
