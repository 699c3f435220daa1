use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: invalid value [{value}] for [{key}]")]
    Invalid {
        key: &'static str,
        value: String
    }
}

impl ConfigError {
    pub fn invalid(key: &'static str, value: &str) -> Self {
        Self::Invalid { key, value: value.to_string() }
    }
}
