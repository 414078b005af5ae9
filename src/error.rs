//! Error types for the sentinel

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the sentinel
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    // Collaborator errors
    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Feed unavailable (HTTP {0})")]
    FeedUnavailable(u16),

    #[error("Safety scorer error: {0}")]
    Scorer(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    // Decoding errors
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Rpc(_) | Error::Feed(_) => true,
            // 4xx means the request itself is wrong; retrying won't help
            Error::FeedUnavailable(status) => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Rpc(e.to_string())
    }
}
