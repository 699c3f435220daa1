use tracing::debug;

use crate::config::FraudConfig;
use crate::models::{RiskRule, RiskVerdict, Transaction};

/// Rule-based suspicion scoring.
///
/// Pure and deterministic: the same transaction and configuration always produce
/// the same verdict. Incomplete input fails closed instead of being rejected.
#[derive(Debug, Clone)]
pub struct RiskEvaluator {
    config: FraudConfig
}

impl RiskEvaluator {
    /// Evaluation order. The first matching rule supplies the verdict reason.
    pub const RULES: [RiskRule; 3] = [RiskRule::IncompleteData, RiskRule::HighAmount, RiskRule::MerchantPattern];

    pub fn new(config: FraudConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, transaction: &Transaction) -> RiskVerdict {
        let matches = Self::RULES.iter()
            .copied()
            .filter(|rule| self.matches(*rule, transaction))
            .collect();

        RiskVerdict::from_matches(matches)
    }

    fn matches(&self, rule: RiskRule, transaction: &Transaction) -> bool {
        match rule {
            RiskRule::IncompleteData => match transaction.validate() {
                Ok(()) => false,
                Err(error) => {
                    debug!("{error}");
                    true
                }
            },
            RiskRule::HighAmount => transaction.amount
                .is_some_and(|amount| amount >= self.config.threshold_for(&transaction.currency)),
            RiskRule::MerchantPattern => transaction.merchant_name()
                .is_some_and(|merchant| self.is_denied_merchant(merchant))
        }
    }

    fn is_denied_merchant(&self, merchant: &str) -> bool {
        let merchant = merchant.to_lowercase();

        self.config.merchant_deny_patterns.iter()
            .any(|pattern| merchant.contains(pattern.as_str()))
    }
}
