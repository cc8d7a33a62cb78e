//! Error types for dbtasks.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dbtasks.
#[derive(Error, Debug)]
pub enum Error {
    // Plan errors
    #[error("Malformed task spec: {0}")]
    MalformedSpec(String),

    // Statement errors
    #[error("{message}")]
    Statement {
        message: String,
        /// Server severity, when the failure came from a diagnostic message.
        severity: Option<u8>,
    },

    // Transaction errors
    #[error("{source}")]
    TransactionAbort {
        source: Box<Error>,
        /// Error raised while rolling back, if any.
        rollback_error: Option<Box<Error>>,
    },

    #[error("Transaction error: {0}")]
    Transaction(String),

    // Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Config errors
    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Create a statement error without a server severity.
    pub fn statement<S: Into<String>>(msg: S) -> Self {
        Error::Statement {
            message: msg.into(),
            severity: None,
        }
    }

    /// Wrap a unit failure that caused a transaction to be rolled back.
    pub fn aborted(source: Error, rollback_error: Option<Error>) -> Self {
        Error::TransactionAbort {
            source: Box::new(source),
            rollback_error: rollback_error.map(Box::new),
        }
    }

    /// The error that originated the failure, looking through transaction aborts.
    pub fn root(&self) -> &Error {
        match self {
            Error::TransactionAbort { source, .. } => source.root(),
            other => other,
        }
    }
}
