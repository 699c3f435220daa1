mod evaluator;

pub use evaluator::RiskEvaluator;
