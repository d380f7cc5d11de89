//! wxwatch error types

use thiserror::Error;

/// wxwatch error type
#[derive(Error, Debug)]
pub enum Error {
    /// Probe, upload or message post failed
    #[error("Network error: {0}")]
    Network(String),

    /// Local state or artifact could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Malformed or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Notification channel failed outside the network path
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether this error came from the network boundary
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Http(_))
    }

    /// Whether this error came from local persistence
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Persistence(_) | Error::Io(_))
    }
}

/// Result type alias for wxwatch operations
pub type Result<T> = std::result::Result<T, Error>;
