//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromoError {
    /// A config source could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Settings loaded but a value is missing or out of range
    #[error("Configuration error: {0}")]
    Config(String),
}
