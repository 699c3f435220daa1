use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::config::ConfigError;

const HIGH_AMOUNT_THRESHOLD: &str = "FRAUD_HIGH_AMOUNT_THRESHOLD";
const CURRENCY_THRESHOLDS: &str = "FRAUD_CURRENCY_THRESHOLDS";
const MERCHANT_DENY_PATTERNS: &str = "FRAUD_MERCHANT_DENY_PATTERNS";
const SESSION_IDLE_TIMEOUT_SECS: &str = "FRAUD_SESSION_IDLE_TIMEOUT_SECS";
const SESSION_ARCHIVE_RETENTION_SECS: &str = "FRAUD_SESSION_ARCHIVE_RETENTION_SECS";
const SESSION_ARCHIVE_CAPACITY: &str = "FRAUD_SESSION_ARCHIVE_CAPACITY";
const OPERATION_TIMEOUT_MS: &str = "FRAUD_OPERATION_TIMEOUT_MS";
const RETRY_DELAY_MS: &str = "FRAUD_RETRY_DELAY_MS";
const MAX_CHALLENGE_ATTEMPTS: &str = "FRAUD_MAX_CHALLENGE_ATTEMPTS";
const SWEEP_INTERVAL_SECS: &str = "FRAUD_SWEEP_INTERVAL_SECS";

/// Shortest period the background sweeper will tick at.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

const DEFAULT_DENY_PATTERNS: [&str; 4] = ["fraud", "scam", "unknown", "test"];

/// Tunables for risk evaluation and verification sessions.
#[derive(Debug, Clone)]
pub struct FraudConfig {
    /// Amounts at or above this value are flagged, unless the currency has its own threshold.
    pub high_amount_threshold: Decimal,
    /// Per-currency overrides keyed by upper-case ISO code.
    pub currency_thresholds: HashMap<String, Decimal>,
    /// Lower-case substrings that mark a merchant as risky.
    pub merchant_deny_patterns: Vec<String>,
    /// Non-terminal sessions idle longer than this are expired by the sweeper.
    pub session_idle_timeout: Duration,
    /// How long resolved and expired sessions stay queryable.
    pub session_archive_retention: Duration,
    pub session_archive_capacity: u64,
    /// Upper bound for any single repository or notifier call.
    pub operation_timeout: Duration,
    /// Pause before the single retry of a failed collaborator call.
    pub retry_delay: Duration,
    pub max_challenge_attempts: u32,
    pub sweep_interval: Duration
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            high_amount_threshold: Decimal::from(5000),
            currency_thresholds: HashMap::new(),
            merchant_deny_patterns: DEFAULT_DENY_PATTERNS.iter().map(|pattern| pattern.to_string()).collect(),
            session_idle_timeout: Duration::from_secs(15 * 60),
            session_archive_retention: Duration::from_secs(24 * 60 * 60),
            session_archive_capacity: 10_000,
            operation_timeout: Duration::from_millis(2_000),
            retry_delay: Duration::from_millis(100),
            max_challenge_attempts: 3,
            sweep_interval: Duration::from_secs(60)
        }
    }
}

impl FraudConfig {
    /// Reads overrides from `FRAUD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup. Missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>
    {
        let mut config = Self::default();

        if let Some(value) = lookup(HIGH_AMOUNT_THRESHOLD) {
            config.high_amount_threshold = parse(HIGH_AMOUNT_THRESHOLD, &value)?;
        }

        if let Some(value) = lookup(CURRENCY_THRESHOLDS) {
            config.currency_thresholds = parse_currency_thresholds(&value)?;
        }

        if let Some(value) = lookup(MERCHANT_DENY_PATTERNS) {
            config.merchant_deny_patterns = parse_patterns(&value);
        }

        if let Some(value) = lookup(SESSION_IDLE_TIMEOUT_SECS) {
            config.session_idle_timeout = Duration::from_secs(parse(SESSION_IDLE_TIMEOUT_SECS, &value)?);
        }

        if let Some(value) = lookup(SESSION_ARCHIVE_RETENTION_SECS) {
            config.session_archive_retention = Duration::from_secs(parse(SESSION_ARCHIVE_RETENTION_SECS, &value)?);
        }

        if let Some(value) = lookup(SESSION_ARCHIVE_CAPACITY) {
            config.session_archive_capacity = parse(SESSION_ARCHIVE_CAPACITY, &value)?;
        }

        if let Some(value) = lookup(OPERATION_TIMEOUT_MS) {
            config.operation_timeout = Duration::from_millis(parse(OPERATION_TIMEOUT_MS, &value)?);
        }

        if let Some(value) = lookup(RETRY_DELAY_MS) {
            config.retry_delay = Duration::from_millis(parse(RETRY_DELAY_MS, &value)?);
        }

        if let Some(value) = lookup(MAX_CHALLENGE_ATTEMPTS) {
            config.max_challenge_attempts = parse(MAX_CHALLENGE_ATTEMPTS, &value)?;
        }

        if let Some(value) = lookup(SWEEP_INTERVAL_SECS) {
            let seconds: u64 = parse(SWEEP_INTERVAL_SECS, &value)?;

            if seconds == 0 {
                return Err(ConfigError::invalid(SWEEP_INTERVAL_SECS, &value))
            }

            config.sweep_interval = Duration::from_secs(seconds);
        }

        Ok(config)
    }

    pub fn with_high_amount_threshold(mut self, threshold: Decimal) -> Self {
        self.high_amount_threshold = threshold;
        self
    }

    pub fn with_currency_threshold(mut self, currency: &str, threshold: Decimal) -> Self {
        self.currency_thresholds.insert(currency.trim().to_uppercase(), threshold);
        self
    }

    pub fn with_merchant_deny_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>
    {
        self.merchant_deny_patterns = patterns.into_iter()
            .map(|pattern| pattern.as_ref().trim().to_lowercase())
            .filter(|pattern| !pattern.is_empty())
            .collect();
        self
    }

    pub fn with_session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = timeout;
        self
    }

    pub fn with_session_archive(mut self, capacity: u64, retention: Duration) -> Self {
        self.session_archive_capacity = capacity;
        self.session_archive_retention = retention;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_challenge_attempts(mut self, attempts: u32) -> Self {
        self.max_challenge_attempts = attempts.max(1);
        self
    }

    /// Sets the sweep period, raised to `MIN_SWEEP_INTERVAL` if shorter.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(MIN_SWEEP_INTERVAL);
        self
    }

    /// The high-value threshold for `currency`, falling back to the global one.
    pub fn threshold_for(&self, currency: &str) -> Decimal {
        self.currency_thresholds.get(&currency.trim().to_uppercase())
            .copied()
            .unwrap_or(self.high_amount_threshold)
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::invalid(key, value))
}

fn parse_patterns(value: &str) -> Vec<String> {
    value.split(',')
        .map(|pattern| pattern.trim().to_lowercase())
        .filter(|pattern| !pattern.is_empty())
        .collect()
}

fn parse_currency_thresholds(value: &str) -> Result<HashMap<String, Decimal>, ConfigError> {
    let mut thresholds = HashMap::new();

    for pair in value.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let Some((currency, threshold)) = pair.split_once('=') else {
            return Err(ConfigError::invalid(CURRENCY_THRESHOLDS, value))
        };

        thresholds.insert(currency.trim().to_uppercase(), parse(CURRENCY_THRESHOLDS, threshold)?);
    }

    Ok(thresholds)
}
