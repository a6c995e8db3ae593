//! Error types for siaet-dl
//!
//! Only failures that can stop a step live here. The result of a data request is
//! not an error: it is classified into an [`ApiOutcome`](crate::types::ApiOutcome)
//! and the orchestrator decides per month whether to persist or skip.

use thiserror::Error;

/// Result type alias for siaet-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for siaet-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "ANO_CONSULTA")
        key: Option<String>,
    },

    /// Token acquisition failed
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a configuration error bound to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Failures of the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Id or secret is empty; no request was made
    #[error("missing credentials")]
    MissingCredentials,

    /// The token endpoint answered with a status envelope other than a token
    #[error("token request rejected ({code}): {message}")]
    Rejected {
        /// Upstream `codigo`
        code: String,
        /// Upstream `mensagem`
        message: String,
    },

    /// The body could not be read as a status envelope
    #[error("unexpected token response: {0}")]
    UnexpectedResponse(String),

    /// The request itself failed
    #[error("token request failed: {0}")]
    Transport(String),
}

/// A failed outbound call (connection refused, timeout, unreadable body)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportFailure {
    /// Description of the failure
    pub message: String,
    /// Whether the failure was a timeout
    pub timeout: bool,
}

impl TransportFailure {
    /// A non-timeout failure
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: false,
        }
    }

    /// A timeout failure
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: true,
        }
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportFailure::timeout(format!("request timed out: {}", e))
        } else if e.is_connect() {
            TransportFailure::new(format!("connection failed: {}", e))
        } else {
            TransportFailure::new(e.to_string())
        }
    }
}
