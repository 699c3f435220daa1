mod transaction_actor;

pub use transaction_actor::{Command, TransactionActor};
