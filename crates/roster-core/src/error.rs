use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Request errors
    #[error("Invalid delete mode: {0}")]
    InvalidDeleteMode(String),

    #[error("Invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
