pub mod actors;
pub mod config;
pub mod engine;
pub mod models;
pub mod risk;
pub mod session;
pub mod storage;
pub mod types;

pub use config::FraudConfig;
pub use engine::{EngineError, Evaluation, FraudEngine, VerificationReply, VerificationRequest};
