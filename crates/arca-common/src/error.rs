//! Error types shared across Arca crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Error type for the shared model and utility layer
#[derive(Error, Debug)]
pub enum CommonError {
    /// File system operations failed
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("Failed to process JSON data: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A computed digest does not match the expected value
    #[error("Checksum mismatch for '{file}' ({algorithm}): expected '{expected}', got '{actual}'")]
    ChecksumMismatch {
        file: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    /// An identifier does not have the expected shape
    #[error("Invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// An enum value arrived as a string we do not recognize
    #[error("Unknown {kind} value: '{value}'")]
    UnknownValue { kind: String, value: String },

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CommonError {
    /// Create a checksum mismatch error
    pub fn checksum_mismatch(
        file: impl Into<String>,
        algorithm: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ChecksumMismatch {
            file: file.into(),
            algorithm: algorithm.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid identifier error
    pub fn invalid_identifier(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown enum value error
    pub fn unknown_value(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnknownValue {
            kind: kind.into(),
            value: value.into(),
        }
    }
}
