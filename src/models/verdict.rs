use serde::{Deserialize, Serialize};

const NORMAL_REASON: &str = "within normal parameters";

/// Risk rules in evaluation priority order.
///
/// The order is user-observable: the first matching rule supplies the reason
/// string shown to the account holder.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskRule {
    IncompleteData,
    HighAmount,
    MerchantPattern
}

impl RiskRule {
    pub fn description(&self) -> &'static str {
        match self {
            RiskRule::IncompleteData => "incomplete data",
            RiskRule::HighAmount => "amount exceeds normal range",
            RiskRule::MerchantPattern => "merchant risk pattern"
        }
    }
}

/// Outcome of one risk evaluation. Built once and never mutated.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RiskVerdict {
    suspicious: bool,
    reason: String,
    matched_rules: Vec<RiskRule>
}

impl RiskVerdict {
    /// Builds a verdict from the rules that matched, in priority order.
    pub fn from_matches(matched_rules: Vec<RiskRule>) -> Self {
        let reason = matched_rules.first()
            .map(RiskRule::description)
            .unwrap_or(NORMAL_REASON)
            .to_string();

        Self {
            suspicious: !matched_rules.is_empty(),
            reason,
            matched_rules
        }
    }

    pub fn suspicious(&self) -> bool {
        self.suspicious
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn matched_rules(&self) -> &[RiskRule] {
        &self.matched_rules
    }
}
