mod errors;
mod fraud_config;

pub use errors::ConfigError;
pub use fraud_config::{FraudConfig, MIN_SWEEP_INTERVAL};
