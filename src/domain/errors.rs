use thiserror::Error;

/// Invalid numeric arguments or malformed records, rejected before any
/// order attempt.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("price must be positive and finite")]
    InvalidPrice,

    #[error("quantity must be non-negative and finite")]
    InvalidQuantity,

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),
}

impl ValidationError {
    pub fn input(msg: impl Into<String>) -> Self {
        ValidationError::InvalidInput(msg.into())
    }
}

/// Invalid risk/strategy parameters. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid risk parameter `{name}`: {reason}")]
    InvalidRiskParameter { name: &'static str, reason: String },

    #[error("invalid strategy parameter `{name}`: {reason}")]
    InvalidStrategyParameter { name: &'static str, reason: String },

    #[error("missing credential: {0} (set it in the environment or .env)")]
    MissingCredential(&'static str),
}
