//! Error types for the work stages.

use thiserror::Error;

/// Result type alias for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Error type for the pipeline, classified so stages can map failures
/// onto the outcome alphabet (fatal input errors vs. transient
/// infrastructure errors).
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Registry returned a non-success response
    #[error("Registry error ({status}): {message}")]
    Registry { status: u16, message: String },

    /// Object-store operation failed
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// The cold tier rejected a thaw request (throttled)
    #[error("Cold-tier restore request rejected: {0}")]
    RestoreRejected(String),

    /// A stage observed a state that should be impossible
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Not enough scratch disk to admit the work
    #[error("Insufficient disk space on {path}: need {needed} bytes, have {available}")]
    InsufficientSpace {
        path: String,
        needed: u64,
        available: u64,
    },

    /// Message payload was not a work-item id
    #[error("Invalid message body: {0}")]
    InvalidMessage(String),

    /// Bag validation machinery failed (not a validation finding)
    #[error(transparent)]
    Bag(#[from] arca_bag::BagError),

    /// Shared model errors
    #[error(transparent)]
    Common(#[from] arca_common::CommonError),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed
    #[error("Failed to process JSON data: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkerError {
    pub fn registry(status: u16, message: impl Into<String>) -> Self {
        Self::Registry {
            status,
            message: message.into(),
        }
    }

    pub fn object_store(message: impl Into<String>) -> Self {
        Self::ObjectStore(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether retrying later could plausibly succeed.
    ///
    /// Input errors and invariant violations are permanent; network,
    /// object-store, and registry 5xx failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            WorkerError::Registry { status, .. } => *status >= 500 || *status == 429,
            WorkerError::ObjectStore(_)
            | WorkerError::RestoreRejected(_)
            | WorkerError::Http(_)
            | WorkerError::Io(_)
            | WorkerError::InsufficientSpace { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(WorkerError::registry(503, "upstream").is_transient());
        assert!(WorkerError::registry(429, "slow down").is_transient());
        assert!(!WorkerError::registry(404, "no such item").is_transient());
        assert!(WorkerError::object_store("timeout").is_transient());
        assert!(!WorkerError::invariant("missing key").is_transient());
        assert!(!WorkerError::InvalidMessage("garbage".to_string()).is_transient());
    }
}
