use chrono::{DateTime, Utc};

pub type TransactionId = String;
pub type UserId = String;
pub type Timestamp = DateTime<Utc>;
