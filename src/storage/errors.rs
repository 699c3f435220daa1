use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    Unavailable(String),
    #[error("Storage call timed out after {0:?}")]
    Timeout(Duration)
}
